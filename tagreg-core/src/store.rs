//! Object-storage collaborator
//!
//! The registries persist tag types, tags and resource tag references through
//! [`ObjectStore`]. Generic object versioning lives behind this trait; the
//! store only guarantees that an object's uuid, and its fully-qualified name
//! within one kind, are unique.
//!
//! [`MemoryObjectStore`] keeps everything in memory and counts writes per kind,
//! which tests use to assert that idempotent operations never write.

use crate::error::{Error, Result};
use crate::model::{FqName, Resource, Tag, TagType};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Kind of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    TagType,
    Tag,
    Resource,
}

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    TagType(TagType),
    Tag(Tag),
    Resource(Resource),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::TagType(_) => ObjectKind::TagType,
            Object::Tag(_) => ObjectKind::Tag,
            Object::Resource(_) => ObjectKind::Resource,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Object::TagType(t) => t.uuid,
            Object::Tag(t) => t.uuid,
            Object::Resource(r) => r.uuid,
        }
    }

    pub fn fq_name(&self) -> &FqName {
        match self {
            Object::TagType(t) => &t.fq_name,
            Object::Tag(t) => &t.fq_name,
            Object::Resource(r) => &r.fq_name,
        }
    }

    /// Parent uuid, if the object lives under another object
    pub fn parent(&self) -> Option<Uuid> {
        match self {
            Object::TagType(_) => None,
            Object::Tag(t) => t.scope.project(),
            Object::Resource(r) => r.parent.as_ref().map(|p| p.uuid),
        }
    }

    /// Whether this object holds a reference to `target`
    pub fn refers_to(&self, target: Uuid) -> bool {
        match self {
            Object::TagType(_) => false,
            Object::Tag(t) => t.tag_type_ref == target,
            Object::Resource(r) => r.tag_refs.iter().any(|tr| tr.uuid == target),
        }
    }

    pub fn into_tag_type(self) -> Option<TagType> {
        match self {
            Object::TagType(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_tag(self) -> Option<Tag> {
        match self {
            Object::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Object::Resource(r) => Some(r),
            _ => None,
        }
    }
}

/// Filters for [`ObjectStore::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub fq_name: Option<FqName>,
    pub parent: Option<Uuid>,
    pub refers_to: Option<Uuid>,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn fq_name(fq_name: FqName) -> Self {
        Self {
            fq_name: Some(fq_name),
            ..Self::default()
        }
    }

    pub fn parent(parent: Uuid) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn refers_to(target: Uuid) -> Self {
        Self {
            refers_to: Some(target),
            ..Self::default()
        }
    }

    pub fn matches(&self, object: &Object) -> bool {
        if let Some(fq_name) = &self.fq_name {
            if object.fq_name() != fq_name {
                return false;
            }
        }
        if let Some(parent) = self.parent {
            if object.parent() != Some(parent) {
                return false;
            }
        }
        if let Some(target) = self.refers_to {
            if !object.refers_to(target) {
                return false;
            }
        }
        true
    }
}

/// Object persistence used by the registries and the association engine
#[async_trait]
pub trait ObjectStore: Debug + Send + Sync {
    /// Persist a new object.
    ///
    /// Fails with [`Error::AlreadyExists`] if the uuid, or the fq_name within
    /// the same kind, is taken.
    async fn create(&self, object: Object) -> Result<()>;

    /// Read an object by uuid; [`Error::NotFound`] if absent.
    async fn read(&self, uuid: Uuid) -> Result<Object>;

    /// Replace an existing object; [`Error::NotFound`] if absent.
    async fn update(&self, object: Object) -> Result<()>;

    /// Delete an object; [`Error::NotFound`] if absent.
    async fn delete(&self, uuid: Uuid) -> Result<()>;

    /// List objects of one kind matching `filter`.
    async fn list(&self, kind: ObjectKind, filter: &ListFilter) -> Result<Vec<Object>>;
}

/// Write counters for one object kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl WriteCounts {
    pub fn total(&self) -> u64 {
        self.creates + self.updates + self.deletes
    }
}

/// In-memory object store
///
/// Stores objects in a `HashMap` with `Arc<RwLock>` for interior mutability.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<Uuid, Object>>>,
    writes: Arc<RwLock<HashMap<ObjectKind, WriteCounts>>>,
}

impl Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("object_count", &self.objects.read().len())
            .finish()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes performed so far against objects of `kind`
    pub fn write_counts(&self, kind: ObjectKind) -> WriteCounts {
        self.writes.read().get(&kind).copied().unwrap_or_default()
    }

    pub fn reset_write_counts(&self) {
        self.writes.write().clear();
    }

    fn record(&self, kind: ObjectKind, bump: impl FnOnce(&mut WriteCounts)) {
        bump(self.writes.write().entry(kind).or_default());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create(&self, object: Object) -> Result<()> {
        let kind = object.kind();
        {
            let mut objects = self.objects.write();
            if objects.contains_key(&object.uuid()) {
                return Err(Error::already_exists(object.uuid().to_string()));
            }
            let duplicate = objects
                .values()
                .any(|o| o.kind() == kind && o.fq_name() == object.fq_name());
            if duplicate {
                return Err(Error::already_exists(object.fq_name().to_string()));
            }
            objects.insert(object.uuid(), object);
        }
        self.record(kind, |c| c.creates += 1);
        Ok(())
    }

    async fn read(&self, uuid: Uuid) -> Result<Object> {
        self.objects
            .read()
            .get(&uuid)
            .cloned()
            .ok_or_else(|| Error::not_found(uuid.to_string()))
    }

    async fn update(&self, object: Object) -> Result<()> {
        let kind = object.kind();
        {
            let mut objects = self.objects.write();
            match objects.get_mut(&object.uuid()) {
                Some(existing) if existing.kind() == kind => *existing = object,
                _ => return Err(Error::not_found(object.uuid().to_string())),
            }
        }
        self.record(kind, |c| c.updates += 1);
        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> Result<()> {
        let removed = self.objects.write().remove(&uuid);
        match removed {
            Some(object) => {
                self.record(object.kind(), |c| c.deletes += 1);
                Ok(())
            }
            None => Err(Error::not_found(uuid.to_string())),
        }
    }

    async fn list(&self, kind: ObjectKind, filter: &ListFilter) -> Result<Vec<Object>> {
        Ok(self
            .objects
            .read()
            .values()
            .filter(|o| o.kind() == kind && filter.matches(o))
            .cloned()
            .collect())
    }
}
