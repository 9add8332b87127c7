//! Advisory locks on the coordination service
//!
//! A lock is a key holding a JSON [`LockRecord`]. Acquisition creates the key;
//! release deletes it only if it still holds the caller's own record. A record
//! older than [`AllocatorConfig::stale_lock_seconds`] is presumed left behind by
//! a crashed holder: it is broken by compare-and-delete against the exact
//! record observed, so two waiters racing to break the same stale lock cannot
//! both remove a fresh successor.

use crate::config::AllocatorConfig;
use crate::error::{CoordinationError, Result};
use crate::service::CoordinationService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the unix epoch
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Contents of a held lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Unique per acquisition
    pub holder: String,
    pub acquired_at_ms: u64,
}

impl LockRecord {
    pub fn new(holder: impl Into<String>, acquired_at_ms: u64) -> Self {
        Self {
            holder: holder.into(),
            acquired_at_ms,
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.acquired_at_ms)
    }
}

/// Factory for named advisory locks under one key prefix
#[derive(Debug, Clone)]
pub struct CoordinationLock {
    coord: Arc<dyn CoordinationService>,
    prefix: String,
    config: AllocatorConfig,
}

impl CoordinationLock {
    pub fn new(
        coord: Arc<dyn CoordinationService>,
        prefix: impl Into<String>,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            coord,
            prefix: prefix.into().trim_end_matches('/').to_string(),
            config,
        }
    }

    /// Key used for the lock called `name`
    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    /// Acquire the lock called `name`, waiting for a live holder and breaking
    /// a stale one.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn acquire(&self, name: &str) -> Result<LockGuard> {
        let key = self.key(name);
        let stale_ms = self.config.stale_lock_ms();
        let started = Instant::now();

        loop {
            let record = LockRecord::new(Uuid::new_v4().to_string(), now_unix_ms());
            let encoded = serde_json::to_string(&record)?;
            if self.coord.create(&key, &encoded).await? {
                return Ok(LockGuard {
                    coord: self.coord.clone(),
                    key,
                    encoded,
                    released: false,
                });
            }

            let Some(current) = self.coord.get(&key).await? else {
                // Released between our create and get
                continue;
            };

            let age_ms = match serde_json::from_str::<LockRecord>(&current) {
                Ok(held) => held.age_ms(now_unix_ms()),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "unreadable lock record, treating as stale");
                    u64::MAX
                }
            };

            if age_ms > stale_ms {
                let broken = self.coord.delete_if_match(&key, &current).await?;
                tracing::warn!(%key, age_ms, stale_ms, broken, "breaking stale lock");
                continue;
            }

            let waited_ms = started.elapsed().as_millis() as u64;
            if waited_ms >= self.config.lock_acquire_timeout_ms {
                return Err(CoordinationError::LockTimeout { key, waited_ms });
            }
            tokio::time::sleep(self.config.retry_interval()).await;
        }
    }
}

/// A held lock. Call [`LockGuard::release`] when the critical section ends.
///
/// Dropping a guard without releasing leaves the record in place until it
/// goes stale, which is the same outcome as a crashed holder.
#[derive(Debug)]
pub struct LockGuard {
    coord: Arc<dyn CoordinationService>,
    key: String,
    encoded: String,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock.
    ///
    /// Returns `Ok(false)` if the lock had already been broken as stale; a
    /// successor's record is never removed.
    pub async fn release(mut self) -> Result<bool> {
        self.released = true;
        let deleted = self.coord.delete_if_match(&self.key, &self.encoded).await?;
        if !deleted {
            tracing::warn!(key = %self.key, "lock was broken while held");
        }
        Ok(deleted)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(key = %self.key, "lock guard dropped without release");
        }
    }
}
