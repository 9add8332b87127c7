//! Tag registry data model
//!
//! `TagType` and `Tag` are owned by the registries; `Resource` is any taggable
//! object managed elsewhere, of which only the tag references matter here.

use crate::ids::{TagId, TagTypeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind name used for project resources (the only scope owner)
pub const PROJECT_KIND: &str = "project";

/// Fully-qualified name: the path of names from the root to the object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(Vec<String>);

impl FqName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// This name extended by one trailing element.
    pub fn child(&self, leaf: impl Into<String>) -> Self {
        let mut parts = self.0.clone();
        parts.push(leaf.into());
        Self(parts)
    }

    /// Last element, the object's own name.
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// Where a tag lives: globally, or under exactly one project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parent", rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Global,
    Project(Uuid),
}

impl Scope {
    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    pub fn project(&self) -> Option<Uuid> {
        match self {
            Scope::Global => None,
            Scope::Project(uuid) => Some(*uuid),
        }
    }
}

/// A tag category (e.g. `application`, `label`, or a user-defined name).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagType {
    pub uuid: Uuid,
    /// Lower-cased, globally unique
    pub name: String,
    pub fq_name: FqName,
    /// Allocated by the coordination allocator; never client-supplied
    pub id: TagTypeId,
    /// Always equal to `name`
    pub display_name: String,
    pub is_predefined: bool,
    /// Whether a resource may carry several values of this type at once
    pub multi_valued: bool,
    /// Auto-created types are internal supporting objects
    pub user_visible: bool,
    pub description: Option<String>,
}

/// A typed label, `type_name=value`, global or scoped to a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub uuid: Uuid,
    pub type_name: String,
    pub value: String,
    /// Always `"{type_name}={value}"`
    pub name: String,
    pub display_name: String,
    pub fq_name: FqName,
    pub scope: Scope,
    /// The single system-managed reference to the tag's `TagType`
    pub tag_type_ref: Uuid,
    pub id: TagId,
    pub description: Option<String>,
}

impl Tag {
    /// The composed tag name for a type/value pair.
    pub fn compose_name(type_name: &str, value: &str) -> String {
        format!("{}={}", type_name, value)
    }

    /// Owner string recorded in the per-type value allocator.
    pub fn allocator_owner(&self) -> String {
        self.fq_name.to_string()
    }
}

/// Edge from a resource to one tag.
///
/// Type and value are denormalised from the tag so the association engine can
/// compute deltas without re-reading every referenced tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagRef {
    pub uuid: Uuid,
    pub type_name: String,
    pub value: String,
    pub fq_name: FqName,
}

impl From<&Tag> for TagRef {
    fn from(tag: &Tag) -> Self {
        Self {
            uuid: tag.uuid,
            type_name: tag.type_name.clone(),
            value: tag.value.clone(),
            fq_name: tag.fq_name.clone(),
        }
    }
}

/// Parent pointer of a resource
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub uuid: Uuid,
    pub kind: String,
}

/// Any taggable object (project, virtual network, virtual machine, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uuid: Uuid,
    pub kind: String,
    pub fq_name: FqName,
    pub parent: Option<ParentRef>,
    /// Owning project for resources without a project parent
    pub owner: Option<Uuid>,
    #[serde(default)]
    pub tag_refs: Vec<TagRef>,
}

impl Resource {
    /// New top-level resource with a fresh uuid
    pub fn new(kind: impl Into<String>, fq_name: FqName) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: kind.into(),
            fq_name,
            parent: None,
            owner: None,
            tag_refs: Vec::new(),
        }
    }

    /// New resource nested under `parent`
    pub fn child_of(parent: &Resource, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: kind.into(),
            fq_name: parent.fq_name.child(name),
            parent: Some(ParentRef {
                uuid: parent.uuid,
                kind: parent.kind.clone(),
            }),
            owner: None,
            tag_refs: Vec::new(),
        }
    }

    pub fn with_owner(mut self, project: Uuid) -> Self {
        self.owner = Some(project);
        self
    }

    pub fn is_project(&self) -> bool {
        self.kind == PROJECT_KIND
    }

    /// The project whose scoped tags this resource may carry.
    ///
    /// A project owns itself; otherwise a project parent wins over the
    /// explicit owner.
    pub fn owning_scope(&self) -> Option<Uuid> {
        if self.is_project() {
            return Some(self.uuid);
        }
        match &self.parent {
            Some(parent) if parent.kind == PROJECT_KIND => Some(parent.uuid),
            _ => self.owner,
        }
    }

    /// Current references of one tag type
    pub fn refs_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a TagRef> {
        self.tag_refs.iter().filter(move |r| r.type_name == type_name)
    }
}
