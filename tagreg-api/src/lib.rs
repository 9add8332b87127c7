//! # Tag registry
//!
//! Tag types, tags and their association to resources, on top of the
//! object store in `tagreg-core` and the ID allocator in `tagreg-coord`.
//!
//! ```no_run
//! # async fn demo() -> tagreg_api::Result<()> {
//! use tagreg_api::{TagCreate, TagService};
//! use tagreg_coord::AllocatorConfig;
//!
//! let service = TagService::memory(AllocatorConfig::default()).await?;
//! let tag = service.tags().create(TagCreate::new("application", "web")).await?;
//! println!("{} -> {}", tag.fq_name, tag.id);
//! # Ok(())
//! # }
//! ```

pub mod associate;
pub mod config;
pub mod error;
pub mod service;
pub mod tag;
pub mod tag_type;
pub mod telemetry;

pub use associate::{TagAssociations, TagSpec, TagsSpec};
pub use config::{ConfigError, TagRegistryConfig};
pub use error::{ApiError, Result};
pub use service::TagService;
pub use tag::{TagCreate, TagRegistry, TagUpdate, TAG_VALUE_ID_PATH};
pub use tag_type::{
    TagTypeCreate, TagTypeRegistry, TagTypeUpdate, TAG_TYPE_ID_PATH, TAG_TYPE_LOCK_PATH,
};
pub use telemetry::{init_logging, LogFormat, LoggingConfig};
