//! Invariants of extraction and classification over generated debate text.

use hansard_frames::terms::count_words;
use hansard_frames::{classify_frame, extract_excerpts, TermVocabulary};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn word_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        6 => prop::sample::select(vec![
            "the", "house", "member", "bill", "country", "trade", "men", "great", "number",
            "question", "this", "that", "must", "will", "upon", "year", "East", "London",
        ]),
        1 => prop::sample::select(vec!["aliens", "immigrants", "foreigners", "immigration"]),
        1 => prop::sample::select(vec!["wages", "labour", "employment", "workers", "unemployed"]),
        1 => prop::sample::select(vec!["compete", "lower", "shortage", "need", "undesirable", "Party"]),
    ]
}

fn separator_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        12 => Just(" "),
        2 => Just(", "),
        2 => Just(". "),
        1 => Just("\n\n"),
    ]
}

fn document_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec((word_strategy(), separator_strategy()), 0..700).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(w, sep)| format!("{}{}", w, sep))
            .collect::<String>()
    })
}

fn band_strategy() -> impl Strategy<Value = (usize, usize, usize)> {
    (5usize..=60, 20usize..=120, 0usize..=300)
        .prop_map(|(window, min_words, extra)| (window, min_words, min_words + extra))
}

// ============================================================================
// Extraction
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn extraction_is_deterministic(text in document_strategy()) {
        prop_assert_eq!(
            extract_excerpts(&text, 40, 80, 450),
            extract_excerpts(&text, 40, 80, 450)
        );
    }

    #[test]
    fn excerpts_stay_in_word_band(text in document_strategy(), (window, min, max) in band_strategy()) {
        for e in extract_excerpts(&text, window, min, max) {
            prop_assert!(e.word_count >= min && e.word_count <= max, "{} not in {}..={}", e.word_count, min, max);
            prop_assert_eq!(e.word_count, count_words(&e.text));
        }
    }

    #[test]
    fn excerpts_hold_a_close_pair(text in document_strategy(), (window, min, max) in band_strategy()) {
        let vocab = TermVocabulary::default();
        for e in extract_excerpts(&text, window, min, max) {
            prop_assert!(e.min_distance <= window);
            let tagged = vocab.tag(&e.text);
            prop_assert!(tagged.qualifies(window));
            prop_assert_eq!(tagged.min_distance(), Some(e.min_distance));
        }
    }

    #[test]
    fn excerpt_spans_are_disjoint(text in document_strategy()) {
        let excerpts = extract_excerpts(&text, 40, 80, 450);
        for pair in excerpts.windows(2) {
            prop_assert!(pair[0].span.1 <= pair[1].span.0);
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn classification_is_deterministic_and_bounded(text in document_strategy()) {
        let (frame, confidence) = classify_frame(&text);
        prop_assert!(confidence <= 10);
        prop_assert_eq!((frame, confidence), classify_frame(&text));
    }
}
