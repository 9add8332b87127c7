//! Resource-tag association engine
//!
//! Applies single and batch tag changes to a resource. Every requested tag is
//! resolved before anything is written, so a batch either lands as one update
//! of the resource's tag references or not at all. A request that leaves the
//! reference set unchanged writes nothing.

use crate::error::{ApiError, Result};
use crate::tag::TagRegistry;
use crate::tag_type::normalize_type_name;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tagreg_core::predefined::is_multi_valued;
use tagreg_core::{Object, ObjectStore, RequestContext, Resource, Scope, Tag, TagRef};
use tracing::{debug, info};
use uuid::Uuid;

/// Requested change for one tag type in a batch.
///
/// An entry with no value and empty add/delete lists unsets the type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSpec {
    pub value: Option<String>,
    pub is_global: bool,
    /// Extra values to attach; multi-valued types only
    pub add_values: Vec<String>,
    /// Values to detach, matched by value string; multi-valued types only
    pub delete_values: Vec<String>,
}

impl TagSpec {
    /// Project-scoped value
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Global value
    pub fn global(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            is_global: true,
            ..Self::default()
        }
    }

    pub fn unset() -> Self {
        Self::default()
    }

    pub fn add_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn delete_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delete_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_unset(&self) -> bool {
        self.value.is_none() && self.add_values.is_empty() && self.delete_values.is_empty()
    }

    fn validate(&self, type_name: &str, multi_valued: bool) -> Result<()> {
        if !multi_valued && !(self.add_values.is_empty() && self.delete_values.is_empty()) {
            return Err(ApiError::validation(format!(
                "tag type '{type_name}' is not multi-valued; add/delete values are not allowed"
            )));
        }
        let added: HashSet<&str> = self
            .value
            .iter()
            .chain(self.add_values.iter())
            .map(String::as_str)
            .collect();
        if let Some(both) = self.delete_values.iter().find(|v| added.contains(v.as_str())) {
            return Err(ApiError::validation(format!(
                "value '{both}' of tag type '{type_name}' is both added and deleted"
            )));
        }
        Ok(())
    }
}

/// Batch of per-type changes keyed by tag type name
pub type TagsSpec = BTreeMap<String, TagSpec>;

#[derive(Debug)]
pub struct TagAssociations {
    store: Arc<dyn ObjectStore>,
    tags: Arc<TagRegistry>,
}

impl TagAssociations {
    pub fn new(store: Arc<dyn ObjectStore>, tags: Arc<TagRegistry>) -> Self {
        Self { store, tags }
    }

    /// Attach `type_name=value` to the resource. For a multi-valued type the
    /// value is added; otherwise it replaces the current one.
    ///
    /// Returns whether the resource was written.
    pub async fn set_tag(
        &self,
        ctx: &RequestContext,
        resource: Uuid,
        type_name: &str,
        value: &str,
        is_global: bool,
    ) -> Result<bool> {
        let spec = TagSpec {
            value: Some(value.to_string()),
            is_global,
            ..TagSpec::default()
        };
        self.set_tags(ctx, resource, &TagsSpec::from([(type_name.to_string(), spec)]))
            .await
    }

    /// Detach every tag of `type_name` from the resource.
    pub async fn unset_tag(
        &self,
        ctx: &RequestContext,
        resource: Uuid,
        type_name: &str,
    ) -> Result<bool> {
        self.set_tags(
            ctx,
            resource,
            &TagsSpec::from([(type_name.to_string(), TagSpec::unset())]),
        )
        .await
    }

    /// Apply a batch of per-type changes atomically.
    #[tracing::instrument(skip(self, ctx, spec), fields(types = spec.len()))]
    pub async fn set_tags(
        &self,
        ctx: &RequestContext,
        resource: Uuid,
        spec: &TagsSpec,
    ) -> Result<bool> {
        let current = self.load_resource(resource).await?;
        let mut desired = current.tag_refs.clone();

        for (raw_type, entry) in spec {
            let type_name = normalize_type_name(raw_type)?;
            let multi_valued = is_multi_valued(&type_name);
            entry.validate(&type_name, multi_valued)?;

            if entry.is_unset() {
                desired.retain(|r| r.type_name != type_name);
                continue;
            }

            let mut resolved = Vec::new();
            for value in entry.value.iter().chain(entry.add_values.iter()) {
                resolved.push(
                    self.resolve(ctx, &current, &type_name, value, entry.is_global)
                        .await?,
                );
            }

            if multi_valued {
                desired.retain(|r| {
                    r.type_name != type_name || !entry.delete_values.contains(&r.value)
                });
                for tag in &resolved {
                    if !desired.iter().any(|r| r.uuid == tag.uuid) {
                        desired.push(TagRef::from(tag));
                    }
                }
            } else if let Some(tag) = resolved.pop() {
                desired.retain(|r| r.type_name != type_name);
                desired.push(TagRef::from(&tag));
            }
        }

        let before: HashSet<Uuid> = current.tag_refs.iter().map(|r| r.uuid).collect();
        let after: HashSet<Uuid> = desired.iter().map(|r| r.uuid).collect();
        if before == after {
            debug!(resource = %current.uuid, "tag references unchanged");
            return Ok(false);
        }

        let mut updated = current;
        updated.tag_refs = desired;
        let count = updated.tag_refs.len();
        self.store.update(Object::Resource(updated)).await?;
        info!(resource = %resource, tags = count, "resource tags updated");
        Ok(true)
    }

    async fn load_resource(&self, uuid: Uuid) -> Result<Resource> {
        let object = match self.store.read(uuid).await {
            Ok(object) => object,
            Err(tagreg_core::Error::NotFound(_)) => {
                return Err(ApiError::validation(format!(
                    "resource {uuid} does not exist"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        object
            .into_resource()
            .ok_or_else(|| ApiError::validation(format!("{uuid} is not a taggable resource")))
    }

    /// Find the tag a request names, in the global scope or in the
    /// resource's owning project.
    async fn resolve(
        &self,
        ctx: &RequestContext,
        resource: &Resource,
        type_name: &str,
        value: &str,
        is_global: bool,
    ) -> Result<Tag> {
        let name = Tag::compose_name(type_name, value);
        if is_global {
            return self
                .tags
                .find(type_name, value, Scope::Global)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("global tag '{name}'")));
        }

        let project = resource.owning_scope().ok_or_else(|| {
            ApiError::not_found(format!(
                "resource {} has no project scope to look up tag '{name}'",
                resource.fq_name
            ))
        })?;
        if !ctx.may_use_scope(project) {
            return Err(ApiError::not_found(format!(
                "tag '{name}' in project {project}"
            )));
        }
        self.tags
            .find(type_name, value, Scope::Project(project))
            .await?
            .ok_or_else(|| ApiError::not_found(format!("tag '{name}' in project {project}")))
    }
}
