//! Tag-type registry
//!
//! Owns the lifecycle of [`TagType`] objects: bootstrap of the predefined
//! table, explicit and auto-create, reference-counted auto-delete, and the
//! visibility rules for non-admin callers. Type IDs come from one 16-bit
//! [`IdAllocator`] keyed by type name.
//!
//! Every read-modify-write on a type runs under the advisory lock named after
//! the type, shared with tag creation and deletion in [`crate::TagRegistry`].

use crate::error::{ApiError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tagreg_coord::{
    AllocatorConfig, CoordinationError, CoordinationLock, CoordinationService, IdAllocator,
    LockGuard,
};
use tagreg_core::{
    FqName, ListFilter, Object, ObjectKind, ObjectStore, RequestContext, TagType, TagTypeId,
    PREDEFINED_TAG_TYPES,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Coordination path of the tag-type ID allocator
pub const TAG_TYPE_ID_PATH: &str = "/id/tag-types";
/// Coordination path of the per-type advisory locks
pub const TAG_TYPE_LOCK_PATH: &str = "/lock/tag-types";

/// Create request for a tag type
#[derive(Debug, Clone, Default)]
pub struct TagTypeCreate {
    pub name: String,
    /// Rejected: IDs are allocated by the system
    pub id: Option<u16>,
    /// Rejected unless equal to `name`
    pub display_name: Option<String>,
    pub description: Option<String>,
}

impl TagTypeCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Update request for a tag type. `id` and `display_name` are immutable.
#[derive(Debug, Clone, Default)]
pub struct TagTypeUpdate {
    pub id: Option<u16>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// Lower-case and trim a type name, rejecting empty names
pub(crate) fn normalize_type_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("tag type name is mandatory"));
    }
    Ok(name.to_lowercase())
}

/// Release `guard`, then return `result`; the operation's own error wins over
/// a release failure.
pub(crate) async fn finish_locked<T>(guard: LockGuard, result: Result<T>) -> Result<T> {
    let released = guard.release().await;
    let value = result?;
    released?;
    Ok(value)
}

#[derive(Debug)]
pub struct TagTypeRegistry {
    store: Arc<dyn ObjectStore>,
    allocator: IdAllocator,
    lock: CoordinationLock,
}

impl TagTypeRegistry {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        coord: Arc<dyn CoordinationService>,
        config: &AllocatorConfig,
    ) -> Self {
        Self {
            store,
            allocator: IdAllocator::u16_space(coord.clone(), TAG_TYPE_ID_PATH),
            lock: CoordinationLock::new(coord, TAG_TYPE_LOCK_PATH, config.clone()),
        }
    }

    /// The type-ID allocator domain
    pub fn id_allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    pub(crate) async fn lock(&self, type_name: &str) -> Result<LockGuard> {
        Ok(self.lock.acquire(type_name).await?)
    }

    /// Reserve the predefined IDs and create any missing predefined types.
    ///
    /// Safe to run on every start.
    #[tracing::instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<()> {
        for predefined in PREDEFINED_TAG_TYPES {
            self.allocator
                .reserve(predefined.id.as_u16() as u32, predefined.name)
                .await?;
            if self.read_by_name(predefined.name).await?.is_some() {
                continue;
            }
            let tag_type = TagType {
                uuid: Uuid::new_v4(),
                name: predefined.name.to_string(),
                fq_name: FqName::new([predefined.name]),
                id: predefined.id,
                display_name: predefined.name.to_string(),
                is_predefined: true,
                multi_valued: predefined.multi_valued,
                user_visible: true,
                description: None,
            };
            match self.store.create(Object::TagType(tag_type)).await {
                Ok(()) => debug!(name = predefined.name, id = %predefined.id, "predefined tag type created"),
                // Another process bootstrapped concurrently
                Err(tagreg_core::Error::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Create a tag type with a freshly allocated ID.
    #[tracing::instrument(skip(self), fields(name = %req.name))]
    pub async fn create(&self, req: TagTypeCreate) -> Result<TagType> {
        let name = normalize_type_name(&req.name)?;
        if req.id.is_some() {
            return Err(ApiError::validation(
                "tag type id is allocated by the system and cannot be set",
            ));
        }
        if let Some(display_name) = &req.display_name {
            if display_name != &name && display_name != &req.name {
                return Err(ApiError::validation(format!(
                    "tag type display name is always its name '{name}'"
                )));
            }
        }

        let guard = self.lock(&name).await?;
        let result = self.create_locked(&name, req.description).await;
        finish_locked(guard, result).await
    }

    async fn create_locked(&self, name: &str, description: Option<String>) -> Result<TagType> {
        if self.read_by_name(name).await?.is_some() {
            return Err(ApiError::conflict(format!("tag type '{name}' already exists")));
        }

        let slot = self.allocator.allocate(name).await?;
        let id = TagTypeId::from_slot(slot).ok_or_else(|| CoordinationError::Exhausted {
            path: TAG_TYPE_ID_PATH.to_string(),
        })?;
        let tag_type = TagType {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            fq_name: FqName::new([name]),
            id,
            display_name: name.to_string(),
            is_predefined: false,
            multi_valued: false,
            user_visible: false,
            description,
        };

        if let Err(e) = self.store.create(Object::TagType(tag_type.clone())).await {
            self.allocator.release(slot, name).await?;
            return Err(e.into());
        }
        info!(name = %name, id = %id, uuid = %tag_type.uuid, "tag type created");
        Ok(tag_type)
    }

    /// Return the named type, creating it if absent. Caller holds the type lock.
    pub(crate) async fn ensure_locked(&self, name: &str) -> Result<TagType> {
        if let Some(existing) = self.read_by_name(name).await? {
            return Ok(existing);
        }
        match self.create_locked(name, None).await {
            Ok(tag_type) => Ok(tag_type),
            // First writer wins
            Err(ApiError::Conflict(_)) => self
                .read_by_name(name)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("tag type '{name}'"))),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, uuid: Uuid) -> Result<TagType> {
        self.store
            .read(uuid)
            .await?
            .into_tag_type()
            .ok_or_else(|| ApiError::not_found(format!("tag type {uuid}")))
    }

    /// Read a tag type as seen by `ctx`.
    ///
    /// Non-admin callers only see predefined types and types reachable
    /// through a tag visible to them.
    pub async fn read(&self, ctx: &RequestContext, uuid: Uuid) -> Result<TagType> {
        let tag_type = self.get(uuid).await?;
        if ctx.is_admin
            || tag_type.is_predefined
            || self.reachable_types(ctx).await?.contains(&uuid)
        {
            return Ok(tag_type);
        }
        Err(ApiError::not_found(format!("tag type {uuid}")))
    }

    pub async fn read_by_name(&self, name: &str) -> Result<Option<TagType>> {
        let name = name.trim().to_lowercase();
        let found = self
            .store
            .list(ObjectKind::TagType, &ListFilter::fq_name(FqName::new([name])))
            .await?;
        Ok(found.into_iter().find_map(Object::into_tag_type))
    }

    /// List tag types visible to `ctx`, ordered by ID.
    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<TagType>> {
        let all = self
            .store
            .list(ObjectKind::TagType, &ListFilter::all())
            .await?
            .into_iter()
            .filter_map(Object::into_tag_type);

        let mut visible: Vec<TagType> = if ctx.is_admin {
            all.collect()
        } else {
            let reachable = self.reachable_types(ctx).await?;
            all.filter(|t| t.is_predefined || reachable.contains(&t.uuid))
                .collect()
        };
        visible.sort_by_key(|t| t.id);
        Ok(visible)
    }

    /// Types referenced by tags the caller can see
    async fn reachable_types(&self, ctx: &RequestContext) -> Result<HashSet<Uuid>> {
        let tags = self.store.list(ObjectKind::Tag, &ListFilter::all()).await?;
        Ok(tags
            .into_iter()
            .filter_map(Object::into_tag)
            .filter(|tag| match tag.scope.project() {
                None => true,
                Some(project) => ctx.project == Some(project),
            })
            .map(|tag| tag.tag_type_ref)
            .collect())
    }

    #[tracing::instrument(skip(self, req))]
    pub async fn update(&self, uuid: Uuid, req: TagTypeUpdate) -> Result<TagType> {
        let mut tag_type = self.get(uuid).await?;
        if req.id.is_some_and(|id| id != tag_type.id.as_u16()) {
            return Err(ApiError::validation("tag type id cannot be updated"));
        }
        if req
            .display_name
            .as_ref()
            .is_some_and(|d| d != &tag_type.name)
        {
            return Err(ApiError::validation("tag type display name cannot be updated"));
        }
        if req.description.is_some() && req.description != tag_type.description {
            tag_type.description = req.description;
            self.store.update(Object::TagType(tag_type.clone())).await?;
        }
        Ok(tag_type)
    }

    /// Number of tags whose type reference points at `uuid`
    pub async fn reference_count(&self, uuid: Uuid) -> Result<usize> {
        Ok(self
            .store
            .list(ObjectKind::Tag, &ListFilter::refers_to(uuid))
            .await?
            .len())
    }

    /// Delete an unused, non-predefined tag type.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        let tag_type = self.get(uuid).await?;
        if tag_type.is_predefined {
            return Err(ApiError::validation(format!(
                "predefined tag type '{}' cannot be deleted",
                tag_type.name
            )));
        }
        let guard = self.lock(&tag_type.name).await?;
        let result = async {
            let refs = self.reference_count(uuid).await?;
            if refs > 0 {
                return Err(ApiError::conflict(format!(
                    "tag type '{}' is still referenced by {refs} tag(s)",
                    tag_type.name
                )));
            }
            self.remove(&tag_type).await
        }
        .await;
        finish_locked(guard, result).await
    }

    /// Delete the type if it is not predefined and no tag references it.
    /// Caller holds the type lock.
    pub(crate) async fn delete_if_unused_locked(&self, uuid: Uuid) -> Result<bool> {
        let tag_type = match self.get(uuid).await {
            Ok(t) => t,
            Err(ApiError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if tag_type.is_predefined || self.reference_count(uuid).await? > 0 {
            return Ok(false);
        }
        self.remove(&tag_type).await?;
        Ok(true)
    }

    async fn remove(&self, tag_type: &TagType) -> Result<()> {
        self.store.delete(tag_type.uuid).await?;
        // A slot now owned by someone else is left alone.
        let released = self
            .allocator
            .release(tag_type.id.as_u16() as u32, &tag_type.name)
            .await?;
        info!(name = %tag_type.name, id = %tag_type.id, released, "tag type deleted");
        Ok(())
    }

    /// Name recorded by the allocator for a type ID
    pub async fn name_for_id(&self, id: TagTypeId) -> Result<Option<String>> {
        Ok(self.allocator.read(id.as_u16() as u32).await?)
    }
}
