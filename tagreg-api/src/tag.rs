//! Tag registry
//!
//! A tag is a `type=value` pair, either global or scoped to one project. Its
//! 32-bit ID packs the type ID over a value ID drawn from a per-type
//! allocator whose slot owner is the tag's fq_name string.

use crate::error::{ApiError, Result};
use crate::tag_type::{finish_locked, normalize_type_name, TagTypeRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tagreg_coord::{CoordinationError, CoordinationService, IdAllocator};
use tagreg_core::{
    FqName, ListFilter, Object, ObjectKind, ObjectStore, Scope, Tag, TagId, TagType, TagValueId,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Parent path of the per-type value allocators
pub const TAG_VALUE_ID_PATH: &str = "/id/tag-values";

/// Create request for a tag
#[derive(Debug, Clone, Default)]
pub struct TagCreate {
    pub type_name: Option<String>,
    pub value: Option<String>,
    /// Ignored: the name is always composed as `type=value`
    pub name: Option<String>,
    /// Rejected: IDs are allocated by the system
    pub id: Option<u32>,
    /// Rejected: the type reference is managed by the system
    pub tag_type_refs: Vec<Uuid>,
    pub scope: Scope,
    pub description: Option<String>,
}

impl TagCreate {
    /// Global tag `type_name=value`
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Scope the tag to `project`
    pub fn in_project(mut self, project: Uuid) -> Self {
        self.scope = Scope::Project(project);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Update request for a tag. Only `description` may change; the other
/// fields are accepted when they repeat the stored value.
#[derive(Debug, Clone, Default)]
pub struct TagUpdate {
    pub type_name: Option<String>,
    pub value: Option<String>,
    pub id: Option<u32>,
    pub tag_type_refs: Option<Vec<Uuid>>,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct TagRegistry {
    store: Arc<dyn ObjectStore>,
    coord: Arc<dyn CoordinationService>,
    types: Arc<TagTypeRegistry>,
    value_allocators: Mutex<HashMap<String, Arc<IdAllocator>>>,
}

impl TagRegistry {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        coord: Arc<dyn CoordinationService>,
        types: Arc<TagTypeRegistry>,
    ) -> Self {
        Self {
            store,
            coord,
            types,
            value_allocators: Mutex::new(HashMap::new()),
        }
    }

    /// Value-ID allocator for one tag type, created on first use
    pub fn value_allocator(&self, type_name: &str) -> Arc<IdAllocator> {
        let mut allocators = self.value_allocators.lock();
        allocators
            .entry(type_name.to_string())
            .or_insert_with(|| {
                Arc::new(IdAllocator::u16_space(
                    self.coord.clone(),
                    format!("{TAG_VALUE_ID_PATH}/{type_name}"),
                ))
            })
            .clone()
    }

    /// Create a tag, auto-creating its type when needed.
    #[tracing::instrument(skip(self, req), fields(type_name = ?req.type_name, value = ?req.value))]
    pub async fn create(&self, req: TagCreate) -> Result<Tag> {
        let type_name = req
            .type_name
            .as_deref()
            .ok_or_else(|| ApiError::validation("tag type name is mandatory"))
            .and_then(normalize_type_name)?;
        let value = req
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::validation("tag value is mandatory"))?
            .to_string();
        if req.id.is_some() {
            return Err(ApiError::validation(
                "tag id is allocated by the system and cannot be set",
            ));
        }
        if !req.tag_type_refs.is_empty() {
            return Err(ApiError::validation(
                "tag type reference is managed by the system",
            ));
        }

        let name = Tag::compose_name(&type_name, &value);
        if req.name.as_ref().is_some_and(|n| n != &name) {
            debug!(supplied = ?req.name, name = %name, "ignoring supplied tag name");
        }
        let fq_name = match req.scope {
            Scope::Global => FqName::new([name.as_str()]),
            Scope::Project(project) => self.project_fq_name(project).await?.child(&name),
        };

        let guard = self.types.lock(&type_name).await?;
        let result = self
            .create_locked(TagDraft {
                type_name: &type_name,
                value,
                name,
                fq_name,
                scope: req.scope,
                description: req.description,
            })
            .await;
        finish_locked(guard, result).await
    }

    async fn project_fq_name(&self, project: Uuid) -> Result<FqName> {
        let parent = match self.store.read(project).await {
            Ok(object) => object.into_resource(),
            Err(tagreg_core::Error::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        match parent {
            Some(parent) if parent.is_project() => Ok(parent.fq_name),
            _ => Err(ApiError::validation(format!(
                "tag scope {project} is not an existing project"
            ))),
        }
    }

    async fn create_locked(&self, draft: TagDraft<'_>) -> Result<Tag> {
        if self.find_by_fq_name(&draft.fq_name).await?.is_some() {
            return Err(ApiError::conflict(format!(
                "tag '{}' already exists",
                draft.fq_name
            )));
        }

        let tag_type = self.types.ensure_locked(draft.type_name).await?;
        let type_uuid = tag_type.uuid;
        match self.persist(tag_type, draft).await {
            Ok(tag) => Ok(tag),
            Err(e) => {
                // Leave no orphaned auto-created type behind
                if let Err(cleanup) = self.types.delete_if_unused_locked(type_uuid).await {
                    warn!(error = %cleanup, "failed to clean up unused tag type");
                }
                Err(e)
            }
        }
    }

    async fn persist(&self, tag_type: TagType, draft: TagDraft<'_>) -> Result<Tag> {
        let owner = draft.fq_name.to_string();
        let allocator = self.value_allocator(draft.type_name);
        let slot = allocator.allocate(&owner).await?;
        let value_id = TagValueId::from_slot(slot).ok_or_else(|| CoordinationError::Exhausted {
            path: allocator.path().to_string(),
        })?;

        let tag = Tag {
            uuid: Uuid::new_v4(),
            type_name: draft.type_name.to_string(),
            value: draft.value,
            display_name: draft.name.clone(),
            name: draft.name,
            fq_name: draft.fq_name,
            scope: draft.scope,
            tag_type_ref: tag_type.uuid,
            id: TagId::from_parts(tag_type.id, value_id),
            description: draft.description,
        };
        if let Err(e) = self.store.create(Object::Tag(tag.clone())).await {
            allocator.release(slot, &owner).await?;
            return Err(e.into());
        }
        info!(fq_name = %tag.fq_name, id = %tag.id, uuid = %tag.uuid, "tag created");
        Ok(tag)
    }

    pub async fn read(&self, uuid: Uuid) -> Result<Tag> {
        self.store
            .read(uuid)
            .await?
            .into_tag()
            .ok_or_else(|| ApiError::not_found(format!("tag {uuid}")))
    }

    pub async fn read_by_fq_name(&self, fq_name: &FqName) -> Result<Tag> {
        self.find_by_fq_name(fq_name)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("tag '{fq_name}'")))
    }

    async fn find_by_fq_name(&self, fq_name: &FqName) -> Result<Option<Tag>> {
        let found = self
            .store
            .list(ObjectKind::Tag, &ListFilter::fq_name(fq_name.clone()))
            .await?;
        Ok(found.into_iter().find_map(Object::into_tag))
    }

    /// Look up the tag `type_name=value` in exactly `scope`
    pub async fn find(&self, type_name: &str, value: &str, scope: Scope) -> Result<Option<Tag>> {
        let type_name = type_name.trim().to_lowercase();
        let filter = match scope {
            Scope::Global => ListFilter::fq_name(FqName::new([Tag::compose_name(&type_name, value)])),
            Scope::Project(project) => ListFilter::parent(project),
        };
        let found = self.store.list(ObjectKind::Tag, &filter).await?;
        Ok(found
            .into_iter()
            .filter_map(Object::into_tag)
            .find(|tag| tag.scope == scope && tag.type_name == type_name && tag.value == value))
    }

    /// All tags, or only those in `scope`, ordered by ID
    pub async fn list(&self, scope: Option<Scope>) -> Result<Vec<Tag>> {
        let filter = match scope {
            Some(Scope::Project(project)) => ListFilter::parent(project),
            _ => ListFilter::all(),
        };
        let mut tags: Vec<Tag> = self
            .store
            .list(ObjectKind::Tag, &filter)
            .await?
            .into_iter()
            .filter_map(Object::into_tag)
            .filter(|tag| scope.map_or(true, |s| tag.scope == s))
            .collect();
        tags.sort_by_key(|tag| tag.id);
        Ok(tags)
    }

    #[tracing::instrument(skip(self, req))]
    pub async fn update(&self, uuid: Uuid, req: TagUpdate) -> Result<Tag> {
        let mut tag = self.read(uuid).await?;
        if req
            .type_name
            .as_ref()
            .is_some_and(|t| t.trim().to_lowercase() != tag.type_name)
        {
            return Err(ApiError::validation("tag type cannot be updated"));
        }
        if req.value.as_ref().is_some_and(|v| v != &tag.value) {
            return Err(ApiError::validation("tag value cannot be updated"));
        }
        if req.id.is_some_and(|id| id != tag.id.as_u32()) {
            return Err(ApiError::validation("tag id cannot be updated"));
        }
        if req
            .tag_type_refs
            .as_ref()
            .is_some_and(|refs| refs.as_slice() != [tag.tag_type_ref])
        {
            return Err(ApiError::validation(
                "tag type reference is managed by the system",
            ));
        }
        if req.description.is_some() && req.description != tag.description {
            tag.description = req.description;
            self.store.update(Object::Tag(tag.clone())).await?;
        }
        Ok(tag)
    }

    /// Delete a tag no resource refers to, release its value ID and drop its
    /// type if that was the last tag of it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        let tag = self.read(uuid).await?;
        let referencing = self
            .store
            .list(ObjectKind::Resource, &ListFilter::refers_to(uuid))
            .await?;
        if !referencing.is_empty() {
            return Err(ApiError::conflict(format!(
                "tag '{}' is still referenced by {} resource(s)",
                tag.fq_name,
                referencing.len()
            )));
        }

        let guard = self.types.lock(&tag.type_name).await?;
        let result = async {
            self.store.delete(uuid).await?;
            let owner = tag.allocator_owner();
            let released = self
                .value_allocator(&tag.type_name)
                .release(tag.id.value_id().as_u16() as u32, &owner)
                .await?;
            info!(fq_name = %tag.fq_name, id = %tag.id, released, "tag deleted");
            self.types.delete_if_unused_locked(tag.tag_type_ref).await?;
            Ok::<_, ApiError>(())
        }
        .await;
        finish_locked(guard, result).await
    }

    /// Owner recorded for a value ID under `type_name`
    pub async fn value_for_id(&self, type_name: &str, id: TagValueId) -> Result<Option<String>> {
        Ok(self
            .value_allocator(type_name)
            .read(id.as_u16() as u32)
            .await?)
    }
}

struct TagDraft<'a> {
    type_name: &'a str,
    value: String,
    name: String,
    fq_name: FqName,
    scope: Scope,
    description: Option<String>,
}
