//! Error types for the ironlog_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ironlog_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// SQLite error; the write that raised it has been rolled back
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input, rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation would break a model invariant
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// A mutation addressed a record that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another process holds the writer lock
    #[error("Store is locked by another writer: {0}")]
    Locked(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a validation error from the messages collected by a `validate()` pass.
    pub fn validation(errors: Vec<String>) -> Self {
        Error::Validation(errors.join("; "))
    }

    /// Whether a caller may reasonably retry the operation after a short delay.
    ///
    /// Only transient store contention qualifies; the core never retries itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Error::Locked(_) => true,
            _ => false,
        }
    }
}
