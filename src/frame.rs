//! Rhetorical frame classification of extracted excerpts.
//!
//! A single scoring pass: cue families are counted, a linkage check looks
//! for a migration term tied to a labour term by causal or contrastive
//! language, a proximity gate decides whether any frame claim is allowed,
//! and a fixed priority order picks the label. Confidence is additive and
//! clamped to 0..=10. The priority rule is a heuristic carried over from the
//! labelled corpus, not a validated ground truth.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::terms::{TaggedText, TermVocabulary};

/// Distance at or under which proximity alone supports a frame claim.
pub const TIGHT_DISTANCE: usize = 20;
/// Distance at or under which proximity still earns a confidence point.
pub const LOOSE_DISTANCE: usize = 30;
/// Share of hedging words above which confidence is docked.
pub const HEDGE_RATIO: f64 = 0.1;

const MIG: &str = r"(?:aliens?|foreigners?|immigra\w*|migrants?)";
const LAB: &str = r"(?:wages?|employ\w*|unemploy\w*|jobs?|labou?r\w*|workers?|workmen)";

static NEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:shortage|scarcity|need(?:s|ed)?|require[sd]?|requirements?|fill(?:s|ed|ing)?|vacanc(?:y|ies)|benefit(?:s|ed|ted)?|beneficial|advantage(?:s|ous)?|essential\s+(?:work\w*|industr\w*|trades?)|demand\s+for\s+labou?r)\b",
    )
    .unwrap()
});
static THREAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:depress(?:es|ed|ing|ion)?|lower(?:s|ed|ing)?|compet(?:e|es|ed|ing|ition|itors?)|undercut\w*|undersell\w*|displac\w*|unemployment|surplus|suffer\w*|mischief|over-?supply|overcrowd\w*|sweat(?:ed|ing)|(?:casual|unskilled|cheap)\s+labou?r|strike-?break\w*|blacklegs?)\b",
    )
    .unwrap()
});
static RACIALIZED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:undesirable\s+(?:\w+\s+){0,2}?(?:aliens?|immigrants?|foreigners?|elements?|classes)|(?:aliens?|immigrants?|foreigners?)\s+(?:\w+\s+){0,3}?(?:undesirable|criminals?|diseased|verminous|inferior)|(?:bad|low|criminal|vicious)\s+character|character\s+of\s+(?:the\s+|these\s+)?(?:aliens?|immigrants?|foreigners?)|(?:alien|foreign|inferior|lower|subject)\s+races?|racial|pauper\s+(?:aliens?|immigrants?|immigration)|destitute\s+aliens?|(?:criminal|diseased|verminous|inferior)\s+(?:\w+\s+){0,2}?(?:aliens?|immigrants?|foreigners?|classes|elements?)|exclu(?:de|sion)\s+(?:of\s+)?(?:\w+\s+){0,2}?(?:aliens?|immigrants?|foreigners?)|(?:colou?red|chinese|yellow)\s+labou?r)\b",
    )
    .unwrap()
});
static MIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bon\s+the\s+(?:one|other)\s+hand\b|\bwhile\b[^.;]{0,120}\bbut\b|\balthough\b[^.;]{0,160}\bhowever\b|\b(?:benefit|advantage)\w*[^.]{0,160}\bbut\b[^.]{0,80}\b(?:harm|threat|danger|risk)\w*",
    )
    .unwrap()
});
static LINKAGE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // causal: aliens ... will ... depress ... wages
        format!(
            r"(?i)\b{MIG}\b.{{0,80}}?\b(?:because|therefore|hence|so\s+that|will|would|must|shall|tends?\s+to)\b.{{0,25}}?\b(?:depress|lower|increas|creat|affect|reduc|displac|undercut)\w*.{{0,20}}?\b{LAB}\b"
        ),
        // causal, reversed: unemployment ... owing to ... aliens
        format!(
            r"(?i)\b{LAB}\b.{{0,80}}?\b(?:because|due\s+to|owing\s+to|result\s+of|caused\s+by)\b.{{0,20}}?\b{MIG}\b"
        ),
        // contrast: aliens ... however ... labour
        format!(
            r"(?i)\b{MIG}\b.{{0,80}}?\b(?:although|yet|however|on\s+the\s+other\s+hand)\b.{{0,30}}?\b{LAB}\b"
        ),
        format!(
            r"(?i)\b{LAB}\b.{{0,80}}?\b(?:but|however|although|whilst)\b.{{0,30}}?\b{MIG}\b"
        ),
        // attribution: foreigners would compete for jobs
        format!(
            r"(?i)\b{MIG}\b.{{0,20}}?\b(?:will|would|must|shall|tends?\s+to)\b.{{0,15}}?\b(?:compete|threaten|benefit|help|assist|take|fill|supply)\w*.{{0,20}}?\b{LAB}\b"
        ),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static ARGUMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:argue[sd]?|maintain(?:s|ed)?|contend(?:s|ed)?|claim(?:s|ed)?|believe[sd]?|submit(?:s|ted)?|assert(?:s|ed)?|urge[sd]?)\b").unwrap()
});
static POLICY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:bills?|acts?|clauses?|amendments?|regulations?|measures?|committees?|second\s+reading|legislation)\b").unwrap()
});
static PROCEDURAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:hear,?\s+hear|order,?\s+order|division|adjourn(?:ed|ment)?|question\s+put)\b").unwrap()
});
static HEDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:perhaps|may\s+be|might|not\s+necessarily|possibly|allegedly|reportedly)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameLabel {
    Need,
    Threat,
    Racialized,
    Mixed,
    Other,
}

impl FrameLabel {
    pub const ALL: [FrameLabel; 5] = [
        FrameLabel::Need,
        FrameLabel::Threat,
        FrameLabel::Racialized,
        FrameLabel::Mixed,
        FrameLabel::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameLabel::Need => "NEED",
            FrameLabel::Threat => "THREAT",
            FrameLabel::Racialized => "RACIALIZED",
            FrameLabel::Mixed => "MIXED",
            FrameLabel::Other => "OTHER",
        }
    }
}

impl fmt::Display for FrameLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown frame {0:?} (expected NEED, THREAT, RACIALIZED, MIXED or OTHER)")]
pub struct ParseFrameError(pub String);

impl FromStr for FrameLabel {
    type Err = ParseFrameError;

    /// Accepts the older LABOUR_NEED / LABOUR_THREAT / RACIALISED spellings too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NEED" | "LABOUR_NEED" => Ok(FrameLabel::Need),
            "THREAT" | "LABOUR_THREAT" => Ok(FrameLabel::Threat),
            "RACIALIZED" | "RACIALISED" => Ok(FrameLabel::Racialized),
            "MIXED" => Ok(FrameLabel::Mixed),
            "OTHER" => Ok(FrameLabel::Other),
            _ => Err(ParseFrameError(s.to_string())),
        }
    }
}

/// Everything the label and score were computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameFeatures {
    pub words: usize,
    pub migration_terms: usize,
    pub labour_terms: usize,
    pub min_distance: Option<usize>,
    /// Matched text of each linkage pattern that fired.
    pub linkage: Vec<String>,
    pub need_cues: usize,
    pub threat_cues: usize,
    pub racialized_cues: usize,
    pub mixed_cues: usize,
    pub argument_verbs: usize,
    pub policy_terms: usize,
    pub procedural_terms: usize,
    pub hedges: usize,
}

impl FrameFeatures {
    pub fn has_linkage(&self) -> bool {
        !self.linkage.is_empty()
    }

    pub fn hedge_ratio(&self) -> f64 {
        self.hedges as f64 / self.words.max(1) as f64
    }

    fn tight(&self) -> bool {
        self.min_distance.is_some_and(|d| d <= TIGHT_DISTANCE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAssessment {
    pub frame: FrameLabel,
    pub confidence: u8,
    pub features: FrameFeatures,
}

pub struct FrameClassifier<'v> {
    vocab: &'v TermVocabulary,
}

impl<'v> FrameClassifier<'v> {
    pub fn new(vocab: &'v TermVocabulary) -> Self {
        Self { vocab }
    }

    pub fn classify(&self, text: &str) -> FrameAssessment {
        let features = self.features(text);
        FrameAssessment {
            frame: assign_frame(&features),
            confidence: confidence(&features),
            features,
        }
    }

    pub fn features(&self, text: &str) -> FrameFeatures {
        if text.trim().is_empty() {
            return FrameFeatures::default();
        }
        let tagged = self.vocab.tag(text);

        FrameFeatures {
            words: tagged.tokens.len(),
            migration_terms: tagged.migration.len(),
            labour_terms: tagged.labour.len(),
            min_distance: tagged.min_distance(),
            linkage: linkage(text, &tagged),
            need_cues: NEED_RE.find_iter(text).count(),
            threat_cues: THREAT_RE.find_iter(text).count(),
            racialized_cues: RACIALIZED_RE.find_iter(text).count(),
            mixed_cues: MIXED_RE.find_iter(text).count(),
            argument_verbs: ARGUMENT_RE.find_iter(text).count(),
            policy_terms: POLICY_RE.find_iter(text).count(),
            procedural_terms: PROCEDURAL_RE.find_iter(text).count(),
            hedges: HEDGE_RE.find_iter(text).count(),
        }
    }
}

/// First match of each linkage pattern that spans a tagged migration token
/// and a tagged labour token. Guarded party references never count.
fn linkage(text: &str, tagged: &TaggedText) -> Vec<String> {
    let covers = |hits: &[usize], start: usize, end: usize| {
        hits.iter().any(|&i| {
            let t = &tagged.tokens[i];
            t.start >= start && t.end <= end
        })
    };
    LINKAGE_RES
        .iter()
        .filter_map(|re| {
            re.find_iter(text)
                .find(|m| {
                    covers(&tagged.migration, m.start(), m.end())
                        && covers(&tagged.labour, m.start(), m.end())
                })
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Gate, then first matching rule wins.
pub fn assign_frame(f: &FrameFeatures) -> FrameLabel {
    if !(f.has_linkage() || f.tight()) {
        return FrameLabel::Other;
    }

    let need = f.need_cues > 0;
    let threat = f.threat_cues > 0;

    if f.racialized_cues > 0 && (need || threat) {
        FrameLabel::Racialized
    } else if f.mixed_cues > 0 || (need && threat) {
        FrameLabel::Mixed
    } else if need {
        FrameLabel::Need
    } else if threat {
        FrameLabel::Threat
    } else {
        FrameLabel::Other
    }
}

pub fn confidence(f: &FrameFeatures) -> u8 {
    let (mig, lab) = (f.migration_terms, f.labour_terms);
    let mut score: i32 = 0;

    if mig >= 2 && lab >= 2 {
        score += 3;
    } else if (mig >= 2 && lab >= 1) || (mig >= 1 && lab >= 2) {
        score += 2;
    }

    match f.min_distance {
        Some(d) if d <= TIGHT_DISTANCE => score += 2,
        Some(d) if d <= LOOSE_DISTANCE => score += 1,
        _ => {}
    }

    if f.has_linkage() {
        score += 1;
    }
    if f.argument_verbs > 0 {
        score += 2;
    }
    if f.policy_terms > 0 {
        score += 1;
    }
    if f.procedural_terms > 0 {
        score -= 2;
    }
    if f.hedge_ratio() > HEDGE_RATIO {
        score -= 1;
    }

    score.clamp(0, 10) as u8
}
