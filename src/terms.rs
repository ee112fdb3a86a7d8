use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

pub const DEFAULT_MIGRATION: &[&str] = &[
    r"immigra(?:nts?|tions?)",
    r"migrants?",
    r"aliens?",
    r"foreigners?",
    r"colonial",
];

pub const DEFAULT_LABOUR: &[&str] = &[
    r"labou?r",
    r"wages?",
    r"employ\w*",
    r"jobs?",
    r"unemploy\w*",
    r"workforce",
    r"strikes?",
    r"unions?",
    r"manpower",
    r"workers?",
];

/// Words that turn a following-position "labour" into a party reference.
pub const DEFAULT_PARTY_FOLLOWERS: &[&str] = &["party", "member", "government", "leader", "bench"];

/// The bare labour noun, the only token the party guard applies to.
static GUARDED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^labou?r$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Migration,
    Labour,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Lower-cased token text.
    pub text: String,
    /// Byte offsets into the original text.
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(text: &str) -> Vec<Token> {
    WORD_RE
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str().to_lowercase(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

pub fn count_words(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Immutable migration/labour vocabulary. Built once, then shared by
/// reference with the extractor and the classifier.
#[derive(Debug, Clone)]
pub struct TermVocabulary {
    migration: Regex,
    labour: Regex,
    party_followers: Vec<String>,
}

impl TermVocabulary {
    pub fn new<S: AsRef<str>>(
        migration: &[S],
        labour: &[S],
        party_followers: &[S],
    ) -> Result<Self> {
        Ok(Self {
            migration: compile_family("migration", migration)?,
            labour: compile_family("labour", labour)?,
            party_followers: party_followers
                .iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        })
    }

    /// Context-free classification of one token.
    pub fn classify(&self, token: &str) -> Option<TermKind> {
        self.classify_in_context(token, None)
    }

    /// Classify `token`, using the token that follows it for the party guard.
    pub fn classify_in_context(&self, token: &str, next: Option<&str>) -> Option<TermKind> {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        if token.is_empty() {
            return None;
        }
        // Loose compounds that hit both families count as migration.
        if self.migration.is_match(token) {
            return Some(TermKind::Migration);
        }
        if !self.labour.is_match(token) {
            return None;
        }
        if GUARDED_RE.is_match(token) {
            if let Some(next) = next {
                let next = next.to_lowercase();
                if self.party_followers.iter().any(|f| next.starts_with(f.as_str())) {
                    return None;
                }
            }
        }
        Some(TermKind::Labour)
    }

    pub fn tag(&self, text: &str) -> TaggedText {
        let tokens = tokenize(text);
        let mut migration = Vec::new();
        let mut labour = Vec::new();

        for (i, tok) in tokens.iter().enumerate() {
            let next = tokens.get(i + 1).map(|t| t.text.as_str());
            match self.classify_in_context(&tok.text, next) {
                Some(TermKind::Migration) => migration.push(i),
                Some(TermKind::Labour) => labour.push(i),
                None => {}
            }
        }

        TaggedText {
            tokens,
            migration,
            labour,
        }
    }
}

impl Default for TermVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_MIGRATION, DEFAULT_LABOUR, DEFAULT_PARTY_FOLLOWERS)
            .expect("built-in vocabulary compiles")
    }
}

fn compile_family<S: AsRef<str>>(family: &'static str, patterns: &[S]) -> Result<Regex> {
    let mut parts = Vec::with_capacity(patterns.len());
    for p in patterns {
        let p = p.as_ref().trim();
        if p.is_empty() {
            continue;
        }
        // Validate each alternative on its own so the error names the culprit.
        Regex::new(p).map_err(|source| Error::Vocabulary {
            family,
            pattern: p.to_string(),
            source,
        })?;
        parts.push(format!("(?:{})", p));
    }
    let joined = if parts.is_empty() {
        // Tokens are never empty, so this never matches.
        "$.^".to_string()
    } else {
        format!("(?i)^(?:{})$", parts.join("|"))
    };
    Regex::new(&joined).map_err(|source| Error::Vocabulary {
        family,
        pattern: joined.clone(),
        source,
    })
}

/// Token stream of a text with migration and labour hit positions.
#[derive(Debug, Clone)]
pub struct TaggedText {
    pub tokens: Vec<Token>,
    pub migration: Vec<usize>,
    pub labour: Vec<usize>,
}

impl TaggedText {
    pub fn min_distance(&self) -> Option<usize> {
        min_pair_distance(&self.migration, &self.labour)
    }

    pub fn qualifies(&self, window: usize) -> bool {
        self.min_distance().is_some_and(|d| d <= window)
    }

    /// Candidate (migration, labour) pairs within `window`: the nearest
    /// partner of every hit, tightest first.
    pub fn candidate_pairs(&self, window: usize) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &m in &self.migration {
            if let Some(l) = nearest(&self.labour, m) {
                pairs.push((m, l));
            }
        }
        for &l in &self.labour {
            if let Some(m) = nearest(&self.migration, l) {
                pairs.push((m, l));
            }
        }
        pairs.retain(|(m, l)| m.abs_diff(*l) <= window);
        pairs.sort_by_key(|&(m, l)| (m.abs_diff(l), m.min(l)));
        pairs.dedup();
        pairs
    }

    /// Byte span covering the tokens `a..=b` (in either order).
    pub fn char_span(&self, a: usize, b: usize) -> (usize, usize) {
        let (lo, hi) = (a.min(b), a.max(b));
        (self.tokens[lo].start, self.tokens[hi].end)
    }
}

/// Smallest |a - b| over two ascending position lists.
pub fn min_pair_distance(a: &[usize], b: &[usize]) -> Option<usize> {
    let (mut i, mut j) = (0, 0);
    let mut best: Option<usize> = None;
    while i < a.len() && j < b.len() {
        let d = a[i].abs_diff(b[j]);
        best = Some(best.map_or(d, |cur| cur.min(d)));
        if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    best
}

fn nearest(sorted: &[usize], x: usize) -> Option<usize> {
    let idx = sorted.partition_point(|&p| p < x);
    let after = sorted.get(idx).copied();
    let before = idx.checked_sub(1).map(|i| sorted[i]);
    match (before, after) {
        (Some(b), Some(a)) if x - b <= a - x => Some(b),
        (_, Some(a)) => Some(a),
        (b, None) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_tokens() {
        let v = TermVocabulary::default();
        for t in ["immigrant", "immigration", "Immigrants", "migrant", "aliens", "foreigner", "colonial"] {
            assert_eq!(v.classify(t), Some(TermKind::Migration), "{}", t);
        }
    }

    #[test]
    fn labour_tokens() {
        let v = TermVocabulary::default();
        for t in ["labour", "labor", "wages", "employment", "employers", "jobs", "unemployed", "workforce", "strike", "unions", "manpower", "workers"] {
            assert_eq!(v.classify(t), Some(TermKind::Labour), "{}", t);
        }
    }

    #[test]
    fn unrelated_tokens() {
        let v = TermVocabulary::default();
        for t in ["weather", "alienate", "foreign", "", "labourer", "strikingly"] {
            assert_eq!(v.classify(t), None, "{}", t);
        }
    }

    #[test]
    fn trailing_punctuation_is_ignored() {
        let v = TermVocabulary::default();
        assert_eq!(v.classify("aliens,"), Some(TermKind::Migration));
        assert_eq!(v.classify("(wages)"), Some(TermKind::Labour));
    }

    #[test]
    fn party_guard() {
        let v = TermVocabulary::default();
        assert_eq!(v.classify_in_context("labour", Some("party")), None);
        assert_eq!(v.classify_in_context("Labour", Some("Members")), None);
        assert_eq!(v.classify_in_context("labour", Some("market")), Some(TermKind::Labour));
        // Only the bare noun is guarded.
        assert_eq!(v.classify_in_context("wages", Some("party")), Some(TermKind::Labour));
    }

    #[test]
    fn party_reference_sentence_has_no_labour_term() {
        let v = TermVocabulary::default();
        let tagged = v.tag("The Labour Party member discussed constitutional reform");
        assert!(tagged.labour.is_empty());
        assert!(tagged.migration.is_empty());
    }

    #[test]
    fn tokenize_keeps_offsets() {
        let text = "Aliens, and WAGES.";
        let toks = tokenize(text);
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0].text, "aliens");
        assert_eq!(&text[toks[2].start..toks[2].end], "WAGES");
    }

    #[test]
    fn distances() {
        assert_eq!(min_pair_distance(&[1, 10, 30], &[18, 50]), Some(8));
        assert_eq!(min_pair_distance(&[], &[3]), None);
        assert_eq!(nearest(&[2, 8], 5), Some(2));
        assert_eq!(nearest(&[2, 8], 6), Some(8));
        assert_eq!(nearest(&[2, 8], 100), Some(8));
        assert_eq!(nearest(&[], 1), None);
    }

    #[test]
    fn candidate_pairs_tightest_first() {
        let v = TermVocabulary::default();
        let tagged = v.tag("aliens one two three wages four aliens wages");
        let pairs = tagged.candidate_pairs(40);
        assert_eq!(pairs[0], (6, 7));
        assert!(pairs.iter().all(|(m, l)| m.abs_diff(*l) <= 40));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = TermVocabulary::new(&["alien("], &["wages"], &["party"]).unwrap_err();
        assert!(matches!(err, Error::Vocabulary { family: "migration", .. }));
    }
}
