//! One-line historian's gloss for an excerpt.
//!
//! Purely cosmetic: a fixed template per frame, filled from keyword tables
//! and the debate year. Nothing downstream reads the result.

use std::sync::LazyLock;

use regex::Regex;

use crate::frame::FrameLabel;

type Table = LazyLock<Vec<(Regex, &'static str)>>;

fn table(rows: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rows.iter()
        .map(|(p, label)| (Regex::new(&format!("(?i){}", p)).unwrap(), *label))
        .collect()
}

static WORKER_CATEGORIES: Table = LazyLock::new(|| {
    table(&[
        (r"\bdock(?:s|ers?)?\b", "dock labourers"),
        (r"\b(?:tailors?|tailoring|sweat(?:ed|ing))\b", "tailors and sweated trades"),
        (r"\b(?:miners?|mining|colliers?|collieries)\b", "miners"),
        (r"\b(?:agricultur\w*|farm\w*)\b", "agricultural labourers"),
        (r"\b(?:seam[ae]n|sailors?|shipping)\b", "seamen"),
        (r"\bunskilled\b", "unskilled workers"),
        (r"\b(?:skilled|tradesm[ae]n|artisans?|craftsm[ae]n)\b", "skilled tradesmen"),
    ])
});

static IMMIGRANT_TERMS: Table = LazyLock::new(|| {
    table(&[
        (r"\balien\s+immigra\w*", "alien immigrants"),
        (r"\bforeign\s+(?:workers?|workmen|labou?r)\b", "foreign workers"),
        (r"\baliens?\b", "aliens"),
        (r"\bimmigra\w*", "immigrants"),
        (r"\bforeigners?\b", "foreigners"),
        (r"\bcolonial\b", "colonial labour"),
    ])
});

static POLICY_MECHANISMS: Table = LazyLock::new(|| {
    table(&[
        (r"\baliens\s+act\b", "the Aliens Act"),
        (r"\baliens\s+bill\b", "the Aliens Bill"),
        (r"\b(?:deport\w*|expul\w*|expel\w*)", "deportation"),
        (r"\bregist\w*", "registration of aliens"),
        (r"\b(?:restrict\w*|exclu\w*)", "restriction of entry"),
        (r"\b(?:permits?|licen[cs]\w*)\b", "labour permits"),
        (r"\b(?:tariffs?|protection)\b", "tariff protection"),
    ])
});

const PERIODS: &[(i32, i32, &str)] = &[
    (1900, 1905, "the early Edwardian debate on alien immigration"),
    (1906, 1910, "the administration of the Aliens Act"),
    (1911, 1914, "pre-war labour unrest"),
    (1915, 1918, "the wartime labour shortage"),
    (1919, 1925, "post-war reconstruction and unemployment"),
    (1926, 1930, "depression and mass unemployment"),
];

pub fn period_context(year: Option<i32>) -> String {
    match year {
        Some(y) => PERIODS
            .iter()
            .find(|(start, end, _)| (*start..=*end).contains(&y))
            .map(|(_, _, ctx)| ctx.to_string())
            .unwrap_or_else(|| format!("the political climate of {}", y)),
        None => "an undated debate".to_string(),
    }
}

fn first_match(rows: &[(Regex, &'static str)], text: &str, fallback: &'static str) -> &'static str {
    rows.iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, label)| *label)
        .unwrap_or(fallback)
}

pub fn worker_category(text: &str) -> &'static str {
    first_match(&WORKER_CATEGORIES, text, "British workers")
}

pub fn immigrant_term(text: &str) -> &'static str {
    first_match(&IMMIGRANT_TERMS, text, "immigrants")
}

pub fn policy_mechanism(text: &str) -> &'static str {
    first_match(&POLICY_MECHANISMS, text, "immigration control")
}

pub fn gloss(text: &str, frame: FrameLabel, year: Option<i32>, speaker: &str) -> String {
    let context = period_context(year);
    let workers = worker_category(text);
    let migrants = immigrant_term(text);
    let mechanism = policy_mechanism(text);

    let sentence = match frame {
        FrameLabel::Threat => format!(
            "Argues that {} threaten {} through wage competition, pressing for {}, during {}",
            migrants, workers, mechanism, context
        ),
        FrameLabel::Need => format!(
            "Argues that {} are needed to meet shortages among {}, resisting {}, during {}",
            migrants, workers, mechanism, context
        ),
        FrameLabel::Racialized => format!(
            "Frames {} as undesirable on grounds of character rather than economics, invoking {}, during {}",
            migrants, mechanism, context
        ),
        FrameLabel::Mixed => format!(
            "Weighs the economic case for {} against the risk to {}, with reference to {}, during {}",
            migrants, workers, mechanism, context
        ),
        FrameLabel::Other => format!(
            "Addresses {} and {} within the labour market concerns of {}",
            migrants, mechanism, context
        ),
    };

    if is_official(speaker) {
        officially(&sentence)
    } else {
        sentence
    }
}

fn is_official(speaker: &str) -> bool {
    let lower = speaker.to_lowercase();
    lower.contains("secretary") || lower.contains("minister")
}

fn officially(sentence: &str) -> String {
    let mut chars = sentence.chars();
    match chars.next() {
        Some(first) => format!("Officially {}{}", first.to_lowercase(), chars.as_str()),
        None => String::new(),
    }
}
