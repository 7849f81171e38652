//! Error types for beacon-core

use thiserror::Error;

/// Main error type for the beacon-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend is unusable or rejected a write
    #[error("storage error: {0}")]
    Storage(String),

    /// A persisted event record could not be turned into an [`EventRecord`](crate::EventRecord)
    #[error("invalid event record: {0}")]
    InvalidEvent(String),
}

/// Result type alias for beacon-core
pub type Result<T> = std::result::Result<T, Error>;
