//! Allocator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default staleness threshold for advisory locks, in seconds
pub const DEFAULT_STALE_LOCK_SECONDS: f64 = 5.0;
/// Default polling interval while waiting on a held lock
pub const DEFAULT_LOCK_RETRY_MS: u64 = 10;
/// Default bound on waiting for a live lock
pub const DEFAULT_LOCK_ACQUIRE_TIMEOUT_MS: u64 = 10_000;

/// Knobs consumed by [`crate::IdAllocator`] and [`crate::CoordinationLock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// A lock held longer than this is presumed abandoned by a crashed
    /// holder and is broken.
    pub stale_lock_seconds: f64,
    pub lock_retry_ms: u64,
    pub lock_acquire_timeout_ms: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            stale_lock_seconds: DEFAULT_STALE_LOCK_SECONDS,
            lock_retry_ms: DEFAULT_LOCK_RETRY_MS,
            lock_acquire_timeout_ms: DEFAULT_LOCK_ACQUIRE_TIMEOUT_MS,
        }
    }
}

impl AllocatorConfig {
    pub fn with_stale_lock_seconds(mut self, seconds: f64) -> Self {
        self.stale_lock_seconds = seconds;
        self
    }

    pub fn with_lock_acquire_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_acquire_timeout_ms = ms;
        self
    }

    /// Staleness threshold in whole milliseconds
    pub fn stale_lock_ms(&self) -> u64 {
        (self.stale_lock_seconds.max(0.0) * 1000.0) as u64
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms.max(1))
    }

    /// Validate at startup
    pub fn validate(&self) -> Result<(), String> {
        if !self.stale_lock_seconds.is_finite() || self.stale_lock_seconds <= 0.0 {
            return Err(format!(
                "stale_lock_seconds must be a positive number, got {}",
                self.stale_lock_seconds
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AllocatorConfig::default();
        assert_eq!(cfg.stale_lock_ms(), 5000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_fractional_seconds() {
        let cfg = AllocatorConfig::default().with_stale_lock_seconds(0.25);
        assert_eq!(cfg.stale_lock_ms(), 250);
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        assert!(AllocatorConfig::default()
            .with_stale_lock_seconds(0.0)
            .validate()
            .is_err());
        assert!(AllocatorConfig::default()
            .with_stale_lock_seconds(f64::NAN)
            .validate()
            .is_err());
    }
}
