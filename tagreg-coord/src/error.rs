//! Error types for the coordination crate

use thiserror::Error;

/// Result type for coordination operations
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Errors that can occur talking to the coordination service
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// Backend failure (network, session expiry, ...)
    #[error("Coordination storage error: {0}")]
    Storage(String),

    /// Lock record encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A live lock was not released within the acquisition timeout
    #[error("Timed out acquiring lock {key} after {waited_ms}ms")]
    LockTimeout { key: String, waited_ms: u64 },

    /// Every ID in the allocator range is taken
    #[error("ID space exhausted under {path}")]
    Exhausted { path: String },

    /// Explicit reservation of a slot held by a different owner
    #[error("ID {id} under {path} is already reserved by {owner:?}")]
    ReservationConflict {
        path: String,
        id: u32,
        owner: String,
    },

    /// ID outside the allocator range
    #[error("ID {id} is outside the range [{start}, {end}) of {path}")]
    OutOfRange {
        path: String,
        id: u32,
        start: u32,
        end: u32,
    },
}

impl CoordinationError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
