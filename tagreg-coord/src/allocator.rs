//! Coordinated ID allocator
//!
//! Maps integer IDs in a fixed range to opaque owner strings. Each reserved ID
//! is one key `{path}/{id:010}` whose value is the owner; zero-padding keeps
//! lexical key order equal to numeric order.
//!
//! Allocation takes the lowest free ID and claims it with create-if-absent, so
//! two concurrent callers can never both win the same slot: the loser moves on
//! to the next candidate. Release is compare-and-delete against the owner the
//! caller expects; a slot that some other actor has re-reserved in the meantime
//! is left exactly as it is.

use crate::error::{CoordinationError, Result};
use crate::service::CoordinationService;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Size of a 16-bit ID space
pub const U16_ID_SPACE: u32 = 1 << 16;

#[derive(Debug, Clone)]
pub struct IdAllocator {
    coord: Arc<dyn CoordinationService>,
    path: String,
    start: u32,
    size: u32,
}

impl IdAllocator {
    /// Allocator over `[start, start + size)` under `path`
    pub fn new(
        coord: Arc<dyn CoordinationService>,
        path: impl Into<String>,
        start: u32,
        size: u32,
    ) -> Self {
        Self {
            coord,
            path: path.into().trim_end_matches('/').to_string(),
            start,
            size,
        }
    }

    /// Allocator over the full 16-bit space
    pub fn u16_space(coord: Arc<dyn CoordinationService>, path: impl Into<String>) -> Self {
        Self::new(coord, path, 0, U16_ID_SPACE)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn end(&self) -> u32 {
        self.start.saturating_add(self.size)
    }

    fn key(&self, id: u32) -> String {
        format!("{}/{:010}", self.path, id)
    }

    fn check_range(&self, id: u32) -> Result<()> {
        if id < self.start || id >= self.end() {
            return Err(CoordinationError::OutOfRange {
                path: self.path.clone(),
                id,
                start: self.start,
                end: self.end(),
            });
        }
        Ok(())
    }

    /// IDs currently reserved, as seen by one listing
    async fn reserved(&self) -> Result<BTreeSet<u32>> {
        let prefix = format!("{}/", self.path);
        let keys = self.coord.list_prefix(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .collect())
    }

    /// Reserve the lowest free ID for `owner` and return it.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path))]
    pub async fn allocate(&self, owner: &str) -> Result<u32> {
        let taken = self.reserved().await?;
        for id in self.start..self.end() {
            if taken.contains(&id) {
                continue;
            }
            if self.coord.create(&self.key(id), owner).await? {
                tracing::debug!(id, "allocated");
                return Ok(id);
            }
            // Lost the race for this slot; keep scanning upward.
        }
        Err(CoordinationError::Exhausted {
            path: self.path.clone(),
        })
    }

    /// Reserve a specific ID for `owner`.
    ///
    /// Succeeds if the slot is free or already held by `owner`; fails with
    /// [`CoordinationError::ReservationConflict`] if another owner holds it.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path))]
    pub async fn reserve(&self, id: u32, owner: &str) -> Result<()> {
        self.check_range(id)?;
        let key = self.key(id);
        loop {
            if self.coord.create(&key, owner).await? {
                return Ok(());
            }
            match self.coord.get(&key).await? {
                Some(current) if current == owner => return Ok(()),
                Some(current) => {
                    return Err(CoordinationError::ReservationConflict {
                        path: self.path.clone(),
                        id,
                        owner: current,
                    })
                }
                // Freed between create and get
                None => continue,
            }
        }
    }

    /// Current owner of `id`, if reserved
    pub async fn read(&self, id: u32) -> Result<Option<String>> {
        self.check_range(id)?;
        self.coord.get(&self.key(id)).await
    }

    /// Free `id` if and only if it is still owned by `expected_owner`.
    ///
    /// Returns `Ok(false)` and leaves the slot untouched when it is free or
    /// held by someone else.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path))]
    pub async fn release(&self, id: u32, expected_owner: &str) -> Result<bool> {
        self.check_range(id)?;
        let released = self
            .coord
            .delete_if_match(&self.key(id), expected_owner)
            .await?;
        if !released {
            let current = self.coord.get(&self.key(id)).await?;
            tracing::warn!(
                id,
                expected_owner,
                current_owner = ?current,
                "slot not released: owner mismatch"
            );
        }
        Ok(released)
    }

    /// Free `id` whoever owns it. Operator escape hatch; normal delete paths
    /// use [`IdAllocator::release`].
    pub async fn delete(&self, id: u32) -> Result<bool> {
        self.check_range(id)?;
        self.coord.delete(&self.key(id)).await
    }
}
