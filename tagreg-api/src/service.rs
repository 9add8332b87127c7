//! Tag service facade
//!
//! Wires the registries and the association engine over one object store and
//! one coordination service, and bootstraps the predefined tag types.

use crate::associate::TagAssociations;
use crate::config::TagRegistryConfig;
use crate::error::{ApiError, Result};
use crate::tag::TagRegistry;
use crate::tag_type::TagTypeRegistry;
use std::sync::Arc;
use tagreg_coord::{AllocatorConfig, CoordinationService, MemoryCoordination};
use tagreg_core::{MemoryObjectStore, ObjectStore, TagTypeId, TagValueId};
use tracing::info;

#[derive(Debug, Clone)]
pub struct TagService {
    store: Arc<dyn ObjectStore>,
    coord: Arc<dyn CoordinationService>,
    types: Arc<TagTypeRegistry>,
    tags: Arc<TagRegistry>,
    associations: Arc<TagAssociations>,
}

impl TagService {
    /// Build the service and run predefined-type bootstrap.
    pub async fn start(
        store: Arc<dyn ObjectStore>,
        coord: Arc<dyn CoordinationService>,
        config: AllocatorConfig,
    ) -> Result<Self> {
        config.validate().map_err(ApiError::validation)?;

        let types = Arc::new(TagTypeRegistry::new(store.clone(), coord.clone(), &config));
        let tags = Arc::new(TagRegistry::new(store.clone(), coord.clone(), types.clone()));
        let associations = Arc::new(TagAssociations::new(store.clone(), tags.clone()));

        types.bootstrap().await?;
        info!(
            stale_lock_seconds = config.stale_lock_seconds,
            "tag service started"
        );

        Ok(Self {
            store,
            coord,
            types,
            tags,
            associations,
        })
    }

    /// Start from a loaded [`TagRegistryConfig`]
    pub async fn from_config(
        store: Arc<dyn ObjectStore>,
        coord: Arc<dyn CoordinationService>,
        config: &TagRegistryConfig,
    ) -> Result<Self> {
        Self::start(store, coord, config.allocator.clone()).await
    }

    /// Service over fresh in-memory backends
    pub async fn memory(config: AllocatorConfig) -> Result<Self> {
        Self::start(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryCoordination::new()),
            config,
        )
        .await
    }

    pub fn tag_types(&self) -> &TagTypeRegistry {
        &self.types
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn associations(&self) -> &TagAssociations {
        &self.associations
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn coordination(&self) -> &Arc<dyn CoordinationService> {
        &self.coord
    }

    /// Type name the allocator currently records for `id`
    pub async fn tag_type_name_for_id(&self, id: TagTypeId) -> Result<Option<String>> {
        self.types.name_for_id(id).await
    }

    /// Tag fq_name the allocator currently records for a value ID of `type_name`
    pub async fn tag_value_for_id(
        &self,
        type_name: &str,
        id: TagValueId,
    ) -> Result<Option<String>> {
        self.tags.value_for_id(type_name, id).await
    }
}
