use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::ExtractConfig;
use crate::terms::{TermVocabulary, DEFAULT_LABOUR, DEFAULT_MIGRATION, DEFAULT_PARTY_FOLLOWERS};

pub const DEFAULT_CONFIG_FILE: &str = "hansard.toml";
pub const ENV_PREFIX: &str = "HANSARD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub window: usize,
    pub min_words: usize,
    pub max_words: usize,
    /// Default floor for `query` and `export`.
    pub min_confidence: u8,
    pub chunk_size: usize,
    pub vocabulary: VocabularySettings,
}

/// Optional replacements for the built-in pattern lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularySettings {
    pub migration: Option<Vec<String>>,
    pub labour: Option<Vec<String>>,
    pub party_followers: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        let extract = ExtractConfig::default();
        Self {
            db_path: PathBuf::from("data/hansard.sqlite"),
            window: extract.window,
            min_words: extract.min_words,
            max_words: extract.max_words,
            min_confidence: 5,
            chunk_size: 500,
            vocabulary: VocabularySettings::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the config file, then `HANSARD_*` variables.
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let settings: Settings = Config::builder()
            .add_source(File::from(file).required(path.is_some()))
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(Error::Settings("window must be positive".into()));
        }
        if self.min_words > self.max_words {
            return Err(Error::Settings(format!(
                "min_words ({}) exceeds max_words ({})",
                self.min_words, self.max_words
            )));
        }
        if self.min_confidence > 10 {
            return Err(Error::Settings(format!(
                "min_confidence must be 0-10, got {}",
                self.min_confidence
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::Settings("chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn extract_config(&self) -> ExtractConfig {
        ExtractConfig {
            window: self.window,
            min_words: self.min_words,
            max_words: self.max_words,
        }
    }

    pub fn vocabulary(&self) -> Result<TermVocabulary> {
        let v = &self.vocabulary;
        TermVocabulary::new(
            &or_default(&v.migration, DEFAULT_MIGRATION),
            &or_default(&v.labour, DEFAULT_LABOUR),
            &or_default(&v.party_followers, DEFAULT_PARTY_FOLLOWERS),
        )
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn or_default(list: &Option<Vec<String>>, fallback: &[&str]) -> Vec<String> {
    match list {
        Some(list) => list.clone(),
        None => fallback.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::TermKind;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    fn temp_file(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_without_sources() {
        let s = Settings::load_with(None, env(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.extract_config(), ExtractConfig::default());
        assert_eq!(s.min_confidence, 5);
        assert_eq!(s.chunk_size, 500);
    }

    #[test]
    fn environment_overrides() {
        let s = Settings::load_with(
            None,
            env(&[("HANSARD_WINDOW", "25"), ("HANSARD_DB_PATH", "/tmp/h.sqlite")]),
        )
        .unwrap();
        assert_eq!(s.window, 25);
        assert_eq!(s.db_path, PathBuf::from("/tmp/h.sqlite"));
        assert_eq!(s.max_words, 450);
    }

    #[test]
    fn file_then_environment() {
        let path = temp_file(
            "hansard.toml",
            "min_words = 60\nmax_words = 300\n\n[vocabulary]\nmigration = [\"aliens?\", \"emigrants?\"]\n",
        );
        let s = Settings::load_with(Some(&path), env(&[("HANSARD_MAX_WORDS", "350")])).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(s.min_words, 60);
        assert_eq!(s.max_words, 350);

        let vocab = s.vocabulary().unwrap();
        assert_eq!(vocab.classify("emigrants"), Some(TermKind::Migration));
        assert_eq!(vocab.classify("immigrants"), None);
        assert_eq!(vocab.classify("wages"), Some(TermKind::Labour));
    }

    #[test]
    fn explicit_file_must_exist() {
        let missing = Path::new("/nonexistent/hansard.toml");
        assert!(matches!(
            Settings::load_with(Some(missing), env(&[])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rejects_inverted_band() {
        let err = Settings::load_with(
            None,
            env(&[("HANSARD_MIN_WORDS", "500"), ("HANSARD_MAX_WORDS", "100")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Settings(_)));

        let zero = Settings { window: 0, ..Settings::default() };
        assert!(zero.validate().is_err());
    }
}
