//! Error types for the tag registry API

use thiserror::Error;

/// Result type for registry and association operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type
///
/// `Validation`, `Conflict` and `NotFound` are client-facing outcomes and are
/// never retried internally. Child-crate failures are wrapped as-is.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Client supplied an immutable or system-managed field, a contradictory
    /// batch spec, or targeted a resource that does not exist
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate tag type name or duplicate tag within a scope, or a delete
    /// refused because references remain
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Tag resolution failed in the requested scope, or the object is gone
    #[error("Not found: {0}")]
    NotFound(String),

    /// Coordination service errors
    #[error("Coordination error: {0}")]
    Coordination(#[from] tagreg_coord::CoordinationError),

    /// Object store errors other than not-found / already-exists
    #[error("Store error: {0}")]
    Store(tagreg_core::Error),
}

impl From<tagreg_core::Error> for ApiError {
    fn from(err: tagreg_core::Error) -> Self {
        match err {
            tagreg_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            tagreg_core::Error::AlreadyExists(msg) => ApiError::Conflict(msg),
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// HTTP status a transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Coordination(tagreg_coord::CoordinationError::LockTimeout { .. }) => 503,
            _ => 500,
        }
    }

    /// Stable error code string for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "err:tag/BadRequest",
            ApiError::NotFound(_) => "err:tag/NotFound",
            ApiError::Conflict(_) => "err:tag/Conflict",
            ApiError::Coordination(_) => "err:tag/Coordination",
            ApiError::Store(_) => "err:tag/Store",
        }
    }
}
