use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {family} pattern {pattern:?}: {source}")]
    Vocabulary {
        family: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: i64, supported: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
