use std::io::BufRead;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Result;
use crate::extract::{ExtractConfig, Excerpt, Extractor};
use crate::frame::{FrameAssessment, FrameClassifier, FrameLabel};
use crate::gloss::gloss;
use crate::quality::extraction_quality;
use crate::speakers::SpeakerIndex;
use crate::terms::TermVocabulary;

/// Leading characters of an excerpt that take part in its dedup key.
const DEDUP_PREFIX_CHARS: usize = 120;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(1[89]\d\d|20\d\d)\b").unwrap());
static URL_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(1[89]\d\d|20\d\d)/").unwrap());
static RELEVANT_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:alien|immigra|unemploy|labou?r|employ|wage|worker|trade\s+union|foreign\s+worker|man\s*power|sweat|competition|industr|economic)",
    )
    .unwrap()
});

/// One line of the JSONL input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<String>,
}

impl SourceDocument {
    pub fn content_key(&self) -> String {
        short_hash(&[&self.url, &self.text])
    }

    /// Year from an ISO date, any four-digit year in the date string, or the
    /// `/YYYY/` segment of a Hansard URL.
    pub fn year(&self) -> Option<i32> {
        if let Some(date) = self.date.as_deref() {
            if let Ok(d) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                return Some(d.year());
            }
            if let Some(c) = YEAR_RE.captures(date) {
                return c[1].parse().ok();
            }
        }
        URL_YEAR_RE
            .captures(&self.url)
            .and_then(|c| c[1].parse().ok())
    }

    /// Untitled documents are always kept.
    pub fn is_relevant(&self) -> bool {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => RELEVANT_TITLE_RE.is_match(title),
            _ => true,
        }
    }

    fn given_speaker(&self) -> Option<&str> {
        self.speaker.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// A classified excerpt ready for storage or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcerptRecord {
    pub dedup_key: String,
    pub url: String,
    pub speaker: String,
    pub date: Option<String>,
    pub year: Option<i32>,
    pub house: Option<String>,
    pub title: Option<String>,
    pub text: String,
    pub word_count: usize,
    pub migration_terms: usize,
    pub labour_terms: usize,
    /// Tightest pair under the vocabulary that last assessed the text.
    pub min_distance: Option<usize>,
    pub extraction_method: String,
    pub frame: FrameLabel,
    pub confidence: u8,
    pub linkage: Vec<String>,
    pub quality: u8,
    pub gloss: String,
}

impl ExcerptRecord {
    fn new(doc: &SourceDocument, speaker: String, excerpt: Excerpt, assessment: FrameAssessment) -> Self {
        let year = doc.year();
        let dedup_key = dedup_key(&doc.url, &speaker, &excerpt.text);
        let quality = extraction_quality(&excerpt);
        let gloss = gloss(&excerpt.text, assessment.frame, year, &speaker);
        Self {
            dedup_key,
            url: doc.url.clone(),
            speaker,
            date: doc.date.clone(),
            year,
            house: doc.house.clone(),
            title: doc.title.clone(),
            word_count: excerpt.word_count,
            migration_terms: excerpt.migration_term_count,
            labour_terms: excerpt.labour_term_count,
            min_distance: Some(excerpt.min_distance),
            extraction_method: excerpt.method.to_string(),
            frame: assessment.frame,
            confidence: assessment.confidence,
            linkage: assessment.features.linkage,
            quality,
            gloss,
            text: excerpt.text,
        }
    }

    /// Re-run classification over the stored text. Term counts are
    /// extraction facts and stay; `min_distance` follows the new vocabulary.
    pub fn reassess(&mut self, classifier: &FrameClassifier) {
        let a = classifier.classify(&self.text);
        self.min_distance = a.features.min_distance;
        self.frame = a.frame;
        self.confidence = a.confidence;
        self.linkage = a.features.linkage;
        self.gloss = gloss(&self.text, self.frame, self.year, &self.speaker);
    }
}

pub fn dedup_key(url: &str, speaker: &str, text: &str) -> String {
    let prefix: String = text.chars().take(DEDUP_PREFIX_CHARS).collect();
    short_hash(&[url, speaker, &prefix])
}

fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    let mut key = hex::encode(hasher.finalize());
    key.truncate(16);
    key
}

/// Extractor and classifier over one shared vocabulary.
pub struct Pipeline<'v> {
    extractor: Extractor<'v>,
    classifier: FrameClassifier<'v>,
}

impl<'v> Pipeline<'v> {
    pub fn new(vocab: &'v TermVocabulary, config: ExtractConfig) -> Self {
        Self {
            extractor: Extractor::new(vocab, config),
            classifier: FrameClassifier::new(vocab),
        }
    }

    pub fn classifier(&self) -> &FrameClassifier<'v> {
        &self.classifier
    }

    pub fn process(&self, doc: &SourceDocument) -> Vec<ExcerptRecord> {
        let excerpts = self.extractor.extract(&doc.text);
        if excerpts.is_empty() {
            return Vec::new();
        }

        let index = match doc.given_speaker() {
            Some(_) => SpeakerIndex::default(),
            None => SpeakerIndex::build(&doc.text),
        };

        excerpts
            .into_iter()
            .map(|excerpt| {
                let speaker = match doc.given_speaker() {
                    Some(s) => s.to_string(),
                    None => index.attribute(excerpt.span.0),
                };
                let assessment = self.classifier.classify(&excerpt.text);
                ExcerptRecord::new(doc, speaker, excerpt, assessment)
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct JsonlBatch {
    pub documents: Vec<SourceDocument>,
    pub skipped: usize,
}

/// Parse JSONL, skipping blank lines and logging malformed ones.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<JsonlBatch> {
    let mut batch = JsonlBatch::default();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SourceDocument>(line) {
            Ok(doc) if !doc.url.trim().is_empty() => batch.documents.push(doc),
            Ok(_) => {
                warn!(line = n + 1, "skipping document without url");
                batch.skipped += 1;
            }
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping malformed line");
                batch.skipped += 1;
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speakers::UNKNOWN_SPEAKER;
    use crate::terms::{DEFAULT_LABOUR, DEFAULT_PARTY_FOLLOWERS};

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/aliens_bill_1905.txt").unwrap()
    }

    fn doc(text: String) -> SourceDocument {
        SourceDocument {
            url: "https://api.parliament.uk/historic-hansard/commons/1905/may/02/aliens-bill".into(),
            text,
            date: Some("1905-05-02".into()),
            title: Some("ALIENS BILL.".into()),
            house: Some("commons".into()),
            ..Default::default()
        }
    }

    #[test]
    fn years() {
        let mut d = doc(String::new());
        assert_eq!(d.year(), Some(1905));
        d.date = Some("2nd May 1911".into());
        assert_eq!(d.year(), Some(1911));
        d.date = None;
        assert_eq!(d.year(), Some(1905));
        d.url = "local".into();
        assert_eq!(d.year(), None);
    }

    #[test]
    fn relevance() {
        let mut d = doc(String::new());
        assert!(d.is_relevant());
        d.title = Some("Supply: Navy Estimates".into());
        assert!(!d.is_relevant());
        d.title = Some("Unemployed Workmen Bill".into());
        assert!(d.is_relevant());
        d.title = None;
        assert!(d.is_relevant());
    }

    #[test]
    fn dedup_key_shape() {
        let k = dedup_key("u", "Mr. A", "text");
        assert_eq!(k.len(), 16);
        assert!(k.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(k, dedup_key("u", "Mr. A", "text"));
        assert_ne!(k, dedup_key("u", "Mr. B", "text"));
        let long = "x".repeat(200);
        assert_eq!(dedup_key("u", "s", &long), dedup_key("u", "s", &format!("{}y", long)));
    }

    #[test]
    fn processes_debate_fixture() {
        let vocab = TermVocabulary::default();
        let pipeline = Pipeline::new(&vocab, ExtractConfig::default());
        let records = pipeline.process(&doc(fixture()));

        assert!(!records.is_empty());
        for r in &records {
            assert!((80..=450).contains(&r.word_count), "{}", r.word_count);
            assert!(r.min_distance.is_some_and(|d| d <= 40));
            assert!(r.confidence <= 10);
            assert_eq!(r.year, Some(1905));
            assert_ne!(r.speaker, UNKNOWN_SPEAKER);
            assert!(!r.gloss.is_empty());
        }
        assert!(records.iter().any(|r| r.speaker == "Mr. Evans-Gordon"));
        assert!(records.iter().any(|r| r.frame == FrameLabel::Threat));
    }

    #[test]
    fn caller_speaker_wins() {
        let vocab = TermVocabulary::default();
        let pipeline = Pipeline::new(&vocab, ExtractConfig::default());
        let mut d = doc(fixture());
        d.speaker = Some("Sir Charles Dilke".into());
        let records = pipeline.process(&d);
        assert!(records.iter().all(|r| r.speaker == "Sir Charles Dilke"));
    }

    #[test]
    fn no_excerpts_for_unrelated_text() {
        let vocab = TermVocabulary::default();
        let pipeline = Pipeline::new(&vocab, ExtractConfig::default());
        assert!(pipeline.process(&doc("The weather was pleasant.".into())).is_empty());
    }

    #[test]
    fn reassess_keeps_extraction() {
        let vocab = TermVocabulary::default();
        let pipeline = Pipeline::new(&vocab, ExtractConfig::default());
        let mut record = pipeline.process(&doc(fixture())).remove(0);
        let before = record.clone();
        record.frame = FrameLabel::Other;
        record.confidence = 0;
        record.reassess(pipeline.classifier());
        assert_eq!(record, before);
    }

    #[test]
    fn reassess_under_narrower_vocabulary() {
        let vocab = TermVocabulary::default();
        let pipeline = Pipeline::new(&vocab, ExtractConfig::default());
        let mut record = pipeline.process(&doc(fixture())).remove(0);
        let before = record.clone();

        let narrow = TermVocabulary::new(&["emigrants?"], DEFAULT_LABOUR, DEFAULT_PARTY_FOLLOWERS).unwrap();
        record.reassess(&FrameClassifier::new(&narrow));
        assert_eq!(record.migration_terms, before.migration_terms);
        assert_eq!(record.labour_terms, before.labour_terms);
        assert_eq!(record.word_count, before.word_count);
        assert_eq!(record.min_distance, None);
        assert!(record.linkage.is_empty());
        assert_eq!(record.frame, FrameLabel::Other);
    }

    #[test]
    fn jsonl_skips_bad_lines() {
        let input = concat!(
            r#"{"url": "a", "text": "aliens and wages", "date": "1905-01-01"}"#, "\n",
            "\n",
            "{not json}\n",
            r#"{"url": "", "text": "no url"}"#, "\n",
            r#"{"url": "b", "text": "more", "speaker": "Mr. Lough", "house": "commons"}"#, "\n",
        );
        let batch = read_jsonl(input.as_bytes()).unwrap();
        assert_eq!(batch.documents.len(), 2);
        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.documents[1].speaker.as_deref(), Some("Mr. Lough"));
    }
}
