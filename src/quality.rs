use std::sync::LazyLock;

use regex::Regex;

use crate::extract::Excerpt;

static ARGUMENT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:argue|maintain|contend|assert|claim|believe|submit|urge|propose)\b",
        r"(?i)\bI\s+(?:think|believe|maintain|argue|submit)\b",
        r"(?i)\bit\s+is\s+(?:clear|evident|obvious|certain)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static POLICY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:bill|act|legislation|measure|policy|government|committee)\b",
        r"(?i)\b(?:second\s+reading|third\s+reading|amendment|clause)\b",
        r"(?i)\b(?:house|parliament|member|hon\.?\s+member)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static FIGURES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d[\d,]*(?:\.\d+)?\s*(?:%|per\s+cent\b|pounds?\b|£)|£\s*\d").unwrap()
});
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:hon\.?\s+members?|right\s+hon\.?\s+gentleman|minister)\b").unwrap()
});

/// How usable an excerpt is as a quotation: length band, term density and
/// debate-structure markers. Independent of the frame label.
pub fn extraction_quality(excerpt: &Excerpt) -> u8 {
    let mut score = match excerpt.word_count {
        150..=300 => 3,
        100..=149 => 2,
        80..=99 => 1,
        301..=450 => 2,
        _ => 0,
    };

    let (mig, lab) = (excerpt.migration_term_count, excerpt.labour_term_count);
    score += match (mig, lab) {
        (m, l) if m >= 3 && l >= 3 => 4,
        (m, l) if m >= 2 && l >= 2 => 3,
        (m, l) if (m >= 1 && l >= 2) || (m >= 2 && l >= 1) => 2,
        (m, l) if m >= 1 && l >= 1 => 1,
        _ => 0,
    };

    let text = excerpt.text.as_str();
    if ARGUMENT_RES.iter().any(|re| re.is_match(text)) {
        score += 1;
    }
    if POLICY_RES.iter().any(|re| re.is_match(text)) {
        score += 1;
    }
    if FIGURES_RE.is_match(text) {
        score += 1;
    }
    if ADDRESS_RE.is_match(text) {
        score += 1;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionMethod;

    fn excerpt(text: &str, words: usize, mig: usize, lab: usize) -> Excerpt {
        Excerpt {
            text: text.to_string(),
            word_count: words,
            migration_term_count: mig,
            labour_term_count: lab,
            min_distance: 1,
            method: ExtractionMethod::Paragraph,
            span: (0, text.len()),
        }
    }

    #[test]
    fn bare_minimum() {
        assert_eq!(extraction_quality(&excerpt("aliens wages", 85, 1, 1)), 2);
    }

    #[test]
    fn rich_passage() {
        let text = "I submit to the hon. Member that this Bill will lower wages by 10 per cent.";
        // 3 (length) + 4 (density) + argument + policy + figures + address
        assert_eq!(extraction_quality(&excerpt(text, 200, 3, 4)), 11);
    }

    #[test]
    fn density_bands() {
        assert_eq!(extraction_quality(&excerpt("", 120, 2, 1)), 4);
        assert_eq!(extraction_quality(&excerpt("", 320, 2, 2)), 5);
    }
}
