//! Error types for Hilo.

use thiserror::Error;

/// Library-level error type for Hilo operations.
#[derive(Error, Debug)]
pub enum HiloError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Message store unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("Message store error: {0}")]
    MessageStore(String),

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: i64, reason: String },

    #[error("Reply chain for message {message_id} in '{title}' loops back on itself")]
    CyclicThread { title: String, message_id: i64 },

    #[error("No embedding available: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Hilo operations.
pub type Result<T> = std::result::Result<T, HiloError>;
