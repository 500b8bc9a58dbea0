// src/error.rs
// =============================================================================
// Typed errors for everything that can fail *before* or *after* a crawl:
// loading config, building the keyspace, reading and writing shard files.
//
// Failures that happen *during* a crawl are not errors in this sense. They
// are classified outcomes (see crawl::classify) and are absorbed by the
// worker that hit them.
//
// main.rs converts these into anyhow::Error with the ? operator.
// =============================================================================

use thiserror::Error;

/// Result type alias for keysweep operations.
pub type Result<T> = std::result::Result<T, KeysweepError>;

#[derive(Error, Debug)]
pub enum KeysweepError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Endpoint URL could not be parsed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration value rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Keyspace cannot be enumerated
    #[error("Keyspace error: {0}")]
    Keyspace(String),
}

impl KeysweepError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn keyspace(message: impl Into<String>) -> Self {
        Self::Keyspace(message.into())
    }
}
