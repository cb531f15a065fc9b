//! Error types for engramd

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input from an external caller (missing owner, empty
    /// content, out-of-range numeric)
    #[error("validation error: {0}")]
    Validation(String),

    /// Lookup by id returned nothing
    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding or completion provider failure
    #[error("provider error: {0}")]
    Provider(String),

    /// Storage driver failure
    #[error("storage error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
