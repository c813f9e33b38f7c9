//! Error types for stash.

use thiserror::Error;

/// Result type alias using stash's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stash operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// File record not found
    #[error("File not found: {0}")]
    FileNotFound(i64),

    /// A deletion is already scheduled for this file
    #[error("Deletion already scheduled for file {0}")]
    AlreadyScheduled(i64),

    /// No deletion is scheduled for this file
    #[error("No deletion scheduled for file {0}")]
    NotScheduled(i64),

    /// Blob storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Semantic index operation failed
    #[error("Index error: {0}")]
    Index(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Text extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error reflects a state/intent mismatch the caller caused
    /// (double delete, restoring an active file). Retrying will not help.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Error::AlreadyScheduled(_) | Error::NotScheduled(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
