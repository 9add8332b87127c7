//! Error types for tagreg-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Object-store error type
#[derive(Error, Debug)]
pub enum Error {
    /// Object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An object with the same uuid or fully-qualified name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an already exists error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Error::AlreadyExists(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Whether this error means the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
