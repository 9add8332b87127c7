//! Coordination-service primitives for the tag registry
//!
//! - [`CoordinationService`]: key/value collaborator with create-if-absent and
//!   compare-and-delete, plus [`MemoryCoordination`] for tests
//! - [`CoordinationLock`]: advisory locks with stale-lock breaking
//! - [`IdAllocator`]: lowest-free ID allocation with owner-checked release
//! - [`AllocatorConfig`]: the `stale_lock_seconds` knob and lock polling

pub mod allocator;
pub mod config;
mod error;
pub mod lock;
pub mod service;

pub use allocator::{IdAllocator, U16_ID_SPACE};
pub use config::AllocatorConfig;
pub use error::{CoordinationError, Result};
pub use lock::{now_unix_ms, CoordinationLock, LockGuard, LockRecord};
pub use service::{CoordinationService, MemoryCoordination};
