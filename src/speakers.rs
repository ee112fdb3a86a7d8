use std::sync::LazyLock;

use regex::Regex;

pub const UNKNOWN_SPEAKER: &str = "Unknown Speaker";

const SMALL_WORDS: &[&str] = &["of", "the", "for", "and", "to", "in"];

static SPEAKER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Mr. EVANS-GORDON (Stepney):
        r"(?:Mr\.|Mrs\.|Sir|Lord|Dr\.)\s+[A-Z][A-Za-z'-]+(?:[ \t]+[A-Z][A-Za-z'-]+)*[ \t]*(?:\([^)\n]*\))?[ \t]*:",
        // Sir Charles Dilke said
        r"(?:Mr\.|Mrs\.|Sir|Lord|Dr\.)\s+[A-Z][A-Za-z'-]+(?:[ \t]+[A-Z][A-Za-z'-]+)*[ \t]+(?:said|asked|replied|continued)\b",
        // THE PRIME MINISTER:
        r"(?m)^[A-Z][A-Z \t]{3,}:",
        r"The\s+(?:Secretary|Minister|President|Chairman)\s+of\s+State",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static TRAILING_VERB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:said|asked|replied|continued)$").unwrap());
static CONSTITUENCY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

/// Speaker headings found in a source text, ordered by position.
#[derive(Debug, Clone, Default)]
pub struct SpeakerIndex {
    boundaries: Vec<(usize, String)>,
}

impl SpeakerIndex {
    pub fn build(text: &str) -> Self {
        let mut boundaries: Vec<(usize, String)> = SPEAKER_RES
            .iter()
            .flat_map(|re| re.find_iter(text))
            .map(|m| (m.start(), normalize_name(m.as_str())))
            .filter(|(_, name)| !name.is_empty())
            .collect();
        boundaries.sort_by_key(|(pos, _)| *pos);
        boundaries.dedup_by_key(|(pos, _)| *pos);
        Self { boundaries }
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// The last speaker heading starting at or before `pos`.
    pub fn speaker_before(&self, pos: usize) -> Option<&str> {
        let idx = self.boundaries.partition_point(|(p, _)| *p <= pos);
        idx.checked_sub(1).map(|i| self.boundaries[i].1.as_str())
    }

    pub fn attribute(&self, pos: usize) -> String {
        self.speaker_before(pos).unwrap_or(UNKNOWN_SPEAKER).to_string()
    }
}

/// Tidy a matched heading into a display name: drops the colon, trailing
/// verb and constituency, and title-cases ALL-CAPS words.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.trim().trim_end_matches(':').trim();
    let name = TRAILING_VERB_RE.replace(name, "");
    let name = CONSTITUENCY_RE.replace_all(&name, "");
    let name = name.trim().trim_end_matches(',');

    name.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else if is_shouting(word) {
                title_case(word)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_shouting(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() > 1 && letters.iter().all(|c| c.is_uppercase())
}

fn title_case(word: &str) -> String {
    word.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}
