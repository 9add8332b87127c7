//! Coordination-service collaborator
//!
//! A string-keyed key/value store with the atomic primitives the allocator and
//! lock need: create-if-absent, compare-and-delete and prefix listing. Keys are
//! `/`-separated paths. Implementations backed by an external quorum service
//! must make `create` and `delete_if_match` atomic with respect to each other.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

#[async_trait]
pub trait CoordinationService: Debug + Send + Sync {
    /// Create `key` with `value` only if the key does not exist.
    ///
    /// Returns `Ok(true)` if created, `Ok(false)` if the key already existed.
    async fn create(&self, key: &str, value: &str) -> Result<bool>;

    /// Read the current value of `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete `key` unconditionally.
    ///
    /// Returns `Ok(true)` if something was deleted.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns `Ok(false)` if the key is absent or holds another value; the
    /// stored value is then left untouched.
    async fn delete_if_match(&self, key: &str, expected: &str) -> Result<bool>;

    /// List every key that starts with `prefix`, in lexical order.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory coordination service for tests and single-process deployments
#[derive(Clone, Default)]
pub struct MemoryCoordination {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl Debug for MemoryCoordination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCoordination")
            .field("entry_count", &self.entries.read().len())
            .finish()
    }
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CoordinationService for MemoryCoordination {
    async fn create(&self, key: &str, value: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn delete_if_match(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(current) if current == expected => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
