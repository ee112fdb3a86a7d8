//! Migration/labour excerpts from parliamentary debate text.
//!
//! [`terms`] tags migration and labour vocabulary, [`extract`] cuts bounded
//! excerpts around close term pairs, and [`frame`] labels each excerpt with
//! its rhetorical frame. [`pipeline`], [`db`] and [`config`] wire those into
//! the `hansard_frames` binary.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod frame;
pub mod gloss;
pub mod pipeline;
pub mod quality;
pub mod speakers;
pub mod terms;

use std::sync::LazyLock;

pub use error::{Error, Result};
pub use extract::{ExtractConfig, Excerpt, ExtractionMethod, Extractor};
pub use frame::{FrameAssessment, FrameClassifier, FrameLabel};
pub use pipeline::{ExcerptRecord, Pipeline, SourceDocument};
pub use terms::{TermKind, TermVocabulary};

static DEFAULT_VOCABULARY: LazyLock<TermVocabulary> = LazyLock::new(TermVocabulary::default);

/// `(is_migration, is_labour)` for a single token under the default
/// vocabulary. At most one is true.
pub fn match_term(token: &str) -> (bool, bool) {
    match DEFAULT_VOCABULARY.classify(token) {
        Some(TermKind::Migration) => (true, false),
        Some(TermKind::Labour) => (false, true),
        None => (false, false),
    }
}

pub fn extract_excerpts(text: &str, window: usize, min_words: usize, max_words: usize) -> Vec<Excerpt> {
    let config = ExtractConfig {
        window,
        min_words,
        max_words,
    };
    Extractor::new(&DEFAULT_VOCABULARY, config).extract(text)
}

pub fn classify_frame(text: &str) -> (FrameLabel, u8) {
    let a = FrameClassifier::new(&DEFAULT_VOCABULARY).classify(text);
    (a.frame, a.confidence)
}
