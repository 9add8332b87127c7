//! Core types for the tag registry
//!
//! This crate holds everything the registries share without depending on the
//! coordination service:
//!
//! - [`TagId`], [`TagTypeId`], [`TagValueId`]: composed 32-bit tag IDs
//! - [`TagType`], [`Tag`], [`Resource`], [`TagRef`]: the data model
//! - [`PREDEFINED_TAG_TYPES`]: well-known tag types with fixed IDs
//! - [`RequestContext`]: caller identity consumed by visibility checks
//! - [`ObjectStore`]: the object-storage collaborator, with
//!   [`MemoryObjectStore`] for tests and single-process use

pub mod context;
mod error;
pub mod ids;
pub mod model;
pub mod predefined;
pub mod store;

pub use context::RequestContext;
pub use error::{Error, Result};
pub use ids::{TagId, TagTypeId, TagValueId};
pub use model::{FqName, ParentRef, Resource, Scope, Tag, TagRef, TagType, PROJECT_KIND};
pub use predefined::{PredefinedTagType, PREDEFINED_TAG_TYPES};
pub use store::{ListFilter, MemoryObjectStore, Object, ObjectKind, ObjectStore, WriteCounts};
