use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::terms::{count_words, TermVocabulary};

static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").unwrap());
static SENTENCE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]["')\]\u{2019}\u{201D}]*\s+|\n[ \t]*(?:\n[ \t]*)+"#).unwrap()
});
static NOISE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)[\[(]\s*(?:interruption|laughter|cheers|cries|hear,?\s*hear|hon\.?\s+members?)[^\])]{0,80}[\])]",
        r"(?i)\bhear,?\s*hear\b[.!]?",
        r"(?i)\border,?\s*order\b[.!]?",
        r"(?i)\bquestion\s+put\b[.!]?",
        r"(?i)\b(?:mr\.?|madam)\s+speaker\b[,.]?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,;:.!?])").unwrap());

/// Sentence window sizes tried, in order, when a paragraph is too short.
pub const SENTENCE_WINDOWS: [usize; 4] = [3, 5, 7, 9];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Max token distance between a migration and a labour term.
    pub window: usize,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            window: 40,
            min_words: 80,
            max_words: 450,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Paragraph,
    Sentences(usize),
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Paragraph => f.write_str("paragraph"),
            ExtractionMethod::Sentences(n) => write!(f, "sentences:{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Excerpt {
    pub text: String,
    pub word_count: usize,
    pub migration_term_count: usize,
    pub labour_term_count: usize,
    pub min_distance: usize,
    pub method: ExtractionMethod,
    /// Byte span of the passage in the source text, before noise stripping.
    pub span: (usize, usize),
}

/// Why a qualifying pair did not become an excerpt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("passage too short ({words} words) even after sentence widening")]
    TooShort { words: usize },
    #[error("passage too long ({words} words)")]
    TooLong { words: usize },
    #[error("no qualifying pair left after noise stripping")]
    LostQualifyingPair,
}

/// Result of scanning one text: accepted excerpts in source order, plus the
/// candidates that were dropped.
#[derive(Debug, Default)]
pub struct Scan {
    pub excerpts: Vec<Excerpt>,
    pub rejected: Vec<Rejection>,
}

pub struct Extractor<'v> {
    vocab: &'v TermVocabulary,
    config: ExtractConfig,
}

impl<'v> Extractor<'v> {
    pub fn new(vocab: &'v TermVocabulary, config: ExtractConfig) -> Self {
        Self { vocab, config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Proximity test alone: does `text` hold a migration/labour pair
    /// within the window?
    pub fn passes(&self, text: &str) -> bool {
        self.vocab.tag(text).qualifies(self.config.window)
    }

    pub fn extract(&self, text: &str) -> Vec<Excerpt> {
        self.scan(text).excerpts
    }

    pub fn scan(&self, text: &str) -> Scan {
        let mut scan = Scan::default();
        if text.trim().is_empty() {
            return scan;
        }

        let tagged = self.vocab.tag(text);
        let pairs = tagged.candidate_pairs(self.config.window);
        if pairs.is_empty() {
            return scan;
        }

        let breaks: Vec<(usize, usize)> = PARAGRAPH_BREAK_RE
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();
        let sentences = sentence_spans(text);
        let mut used: Vec<(usize, usize)> = Vec::new();
        let mut attempted: HashSet<((usize, usize), usize)> = HashSet::new();

        for (m, l) in pairs {
            let hit = tagged.char_span(m, l);
            if used.iter().any(|u| overlaps(*u, hit)) {
                continue;
            }

            let para = paragraph_bounds(text, &breaks, hit);
            let sentence = sentence_index(&sentences, hit.0);
            // Pairs in the same paragraph and sentence produce the same candidate.
            if !attempted.insert((para, sentence)) {
                continue;
            }

            match self.build(text, para, &sentences, sentence) {
                Ok(excerpt) => {
                    if used.iter().any(|u| overlaps(*u, excerpt.span)) {
                        continue;
                    }
                    used.push(excerpt.span);
                    scan.excerpts.push(excerpt);
                }
                Err(reason) => {
                    debug!(hit_start = hit.0, hit_end = hit.1, %reason, "candidate skipped");
                    scan.rejected.push(reason);
                }
            }
        }

        scan.excerpts.sort_by_key(|e| e.span.0);
        scan
    }

    fn build(
        &self,
        text: &str,
        para: (usize, usize),
        sentences: &[(usize, usize)],
        sentence: usize,
    ) -> Result<Excerpt, Rejection> {
        let ExtractConfig {
            window,
            min_words,
            max_words,
        } = self.config;

        let cleaned = clean_passage(&text[para.0..para.1]);
        let words = count_words(&cleaned);

        let (passage, word_count, method, span) = if words > max_words {
            return Err(Rejection::TooLong { words });
        } else if words >= min_words {
            (cleaned, words, ExtractionMethod::Paragraph, para)
        } else {
            self.widen(text, sentences, sentence)
                .ok_or(Rejection::TooShort { words })?
        };

        let tagged = self.vocab.tag(&passage);
        let Some(min_distance) = tagged.min_distance().filter(|d| *d <= window) else {
            return Err(Rejection::LostQualifyingPair);
        };

        Ok(Excerpt {
            word_count,
            migration_term_count: tagged.migration.len(),
            labour_term_count: tagged.labour.len(),
            min_distance,
            method,
            span,
            text: passage,
        })
    }

    fn widen(
        &self,
        text: &str,
        sentences: &[(usize, usize)],
        idx: usize,
    ) -> Option<(String, usize, ExtractionMethod, (usize, usize))> {
        if sentences.is_empty() {
            return None;
        }
        let range = self.config.min_words..=self.config.max_words;
        for size in SENTENCE_WINDOWS {
            let half = size / 2;
            let lo = idx.saturating_sub(half);
            let hi = (idx + half + 1).min(sentences.len());
            let span = (sentences[lo].0, sentences[hi - 1].1);
            let passage = clean_passage(&text[span.0..span.1]);
            let words = count_words(&passage);
            if range.contains(&words) {
                return Some((passage, words, ExtractionMethod::Sentences(size), span));
            }
        }
        None
    }
}

/// Strip procedural interjections and normalise whitespace.
pub fn clean_passage(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in NOISE_RES.iter() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    let collapsed = WHITESPACE_RE.replace_all(&cleaned, " ");
    let tightened = SPACE_BEFORE_PUNCT_RE.replace_all(&collapsed, "$1");
    tightened
        .trim()
        .trim_start_matches([',', ';', ':', '.'])
        .trim_start()
        .to_string()
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Widen `hit` to the enclosing blank-line-delimited paragraph(s), or the
/// whole document when there are no breaks around it.
fn paragraph_bounds(text: &str, breaks: &[(usize, usize)], hit: (usize, usize)) -> (usize, usize) {
    let start = breaks
        .iter()
        .rev()
        .find(|b| b.1 <= hit.0)
        .map(|b| b.1)
        .unwrap_or(0);
    let end = breaks
        .iter()
        .find(|b| b.0 >= hit.1)
        .map(|b| b.0)
        .unwrap_or(text.len());
    (start, end)
}

/// Byte spans of sentences. A sentence ends at terminal punctuation followed
/// by whitespace and an upper-case letter, or at a paragraph break.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;

    for m in SENTENCE_BREAK_RE.find_iter(text) {
        let paragraph_break = m.as_str().starts_with('\n');
        let next_upper = text[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase());
        if !paragraph_break && !next_upper {
            continue;
        }
        let end = m.start() + m.as_str().trim_end().len();
        if !text[start..end].trim().is_empty() {
            spans.push((start, end));
        }
        start = m.end();
    }
    if !text[start..].trim().is_empty() {
        spans.push((start, text.len()));
    }
    spans
}

fn sentence_index(spans: &[(usize, usize)], pos: usize) -> usize {
    spans.partition_point(|s| s.0 <= pos).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` words that match neither vocabulary family.
    fn filler(n: usize) -> String {
        const POOL: &[&str] = &["the", "house", "considered", "this", "matter", "with", "great", "care"];
        (0..n).map(|i| POOL[i % POOL.len()]).collect::<Vec<_>>().join(" ")
    }

    fn extract(text: &str) -> Vec<Excerpt> {
        let vocab = TermVocabulary::default();
        Extractor::new(&vocab, ExtractConfig::default()).extract(text)
    }

    #[test]
    fn weather_has_no_excerpt() {
        assert!(extract("The weather was fine today.").is_empty());
    }

    #[test]
    fn blank_input() {
        assert!(extract("").is_empty());
        assert!(extract("   \n\n\t ").is_empty());
    }

    #[test]
    fn single_family_only() {
        let text = format!("{} aliens and more aliens {}", filler(60), filler(60));
        assert!(extract(&text).is_empty());
        let text = format!("{} wages and employment {}", filler(60), filler(60));
        assert!(extract(&text).is_empty());
    }

    #[test]
    fn pair_outside_window() {
        let text = format!("{} aliens {} wages {}", filler(30), filler(41), filler(30));
        assert!(extract(&text).is_empty());
    }

    #[test]
    fn paragraph_expansion() {
        let para = format!("{} aliens lower wages {}.", filler(50), filler(50));
        let text = format!("{}\n\n{}\n\n{}", filler(300), para, filler(300));
        let found = extract(&text);
        assert_eq!(found.len(), 1);
        let e = &found[0];
        assert_eq!(e.method, ExtractionMethod::Paragraph);
        assert_eq!(e.word_count, 103);
        assert_eq!(e.migration_term_count, 1);
        assert_eq!(e.labour_term_count, 1);
        assert_eq!(e.min_distance, 2);
        assert_eq!(&text[e.span.0..e.span.1], para);
        assert!(e.text.contains("aliens lower wages"));
    }

    #[test]
    fn long_paragraph_is_rejected_not_truncated() {
        let text = format!("{} aliens wages {}", filler(250), filler(250));
        let vocab = TermVocabulary::default();
        let scan = Extractor::new(&vocab, ExtractConfig::default()).scan(&text);
        assert!(scan.excerpts.is_empty());
        assert_eq!(scan.rejected, vec![Rejection::TooLong { words: 502 }]);
    }

    fn one_sentence_paragraphs() -> String {
        // 9 words each; the hit sentence has 8.
        let plain = "The house considered this matter with great care today.";
        let mut parts = vec![plain; 10];
        parts.push("These aliens will lower wages in the docks.");
        parts.extend(vec![plain; 10]);
        parts.join("\n\n")
    }

    #[test]
    fn short_paragraph_widens_by_sentences() {
        let found = extract(&one_sentence_paragraphs());
        assert_eq!(found.len(), 1);
        let e = &found[0];
        assert_eq!(e.method, ExtractionMethod::Sentences(9));
        assert_eq!(e.word_count, 80);
        assert!(e.text.contains("These aliens will lower wages"));
        assert!(!e.text.contains('\n'));
    }

    #[test]
    fn widening_exhausted() {
        let vocab = TermVocabulary::default();
        let config = ExtractConfig {
            min_words: 100,
            ..ExtractConfig::default()
        };
        let scan = Extractor::new(&vocab, config).scan(&one_sentence_paragraphs());
        assert!(scan.excerpts.is_empty());
        assert_eq!(scan.rejected, vec![Rejection::TooShort { words: 8 }]);
    }

    #[test]
    fn noise_stripping_can_lose_the_pair() {
        let text = format!("{} aliens [Hon. Members: Wages!] {}", filler(45), filler(45));
        let vocab = TermVocabulary::default();
        let extractor = Extractor::new(&vocab, ExtractConfig::default());
        assert!(extractor.passes(&text));
        let scan = extractor.scan(&text);
        assert!(scan.excerpts.is_empty());
        assert_eq!(scan.rejected, vec![Rejection::LostQualifyingPair]);
    }

    #[test]
    fn several_disjoint_excerpts() {
        let a = format!("{} aliens depress wages {}.", filler(45), filler(45));
        let b = format!("{} the foreigners took jobs {}.", filler(60), filler(60));
        let text = format!("{}\n\n{}\n\n{}\n\n{}", a, filler(500), b, filler(20));
        let found = extract(&text);
        assert_eq!(found.len(), 2);
        assert!(found[0].span.1 <= found[1].span.0);
        assert!(found[0].text.contains("aliens depress wages"));
        assert!(found[1].text.contains("foreigners took jobs"));
    }

    #[test]
    fn clean_passage_strips_interjections() {
        let raw = "Mr. Speaker, the aliens (Hear, hear.) are here. [Interruption.]\n\nOrder, order! Wages fell.";
        assert_eq!(clean_passage(raw), "the aliens are here. Wages fell.");
    }

    #[test]
    fn sentences_split_on_capitals_and_breaks() {
        let text = "One thing. Two things e.g. more. Three\n\nfour";
        let spans = sentence_spans(text);
        let got: Vec<&str> = spans.iter().map(|s| &text[s.0..s.1]).collect();
        assert_eq!(got, vec!["One thing.", "Two things e.g. more.", "Three", "four"]);
    }

    #[test]
    fn paragraph_bounds_default_to_document() {
        let text = "aliens wages";
        assert_eq!(paragraph_bounds(text, &[], (0, 12)), (0, 12));
    }
}
