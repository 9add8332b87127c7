//! Shared test harness for tagreg-api integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use tagreg_api::TagService;
use tagreg_coord::{AllocatorConfig, MemoryCoordination};
use tagreg_core::{FqName, MemoryObjectStore, Object, ObjectKind, ObjectStore, Resource, PROJECT_KIND};
use uuid::Uuid;

// =============================================================================
// Service harness
// =============================================================================

/// Memory-backed service plus handles on its backends
pub struct Harness {
    pub service: TagService,
    pub store: MemoryObjectStore,
    pub coord: MemoryCoordination,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(AllocatorConfig::default()).await
    }

    pub async fn with_config(config: AllocatorConfig) -> Self {
        let store = MemoryObjectStore::new();
        let coord = MemoryCoordination::new();
        let service = TagService::start(Arc::new(store.clone()), Arc::new(coord.clone()), config)
            .await
            .expect("service start");
        Self {
            service,
            store,
            coord,
        }
    }

    /// Resource writes recorded by the store since the last reset
    pub fn resource_updates(&self) -> u64 {
        self.store.write_counts(ObjectKind::Resource).updates
    }

    pub fn reset_counts(&self) {
        self.store.reset_write_counts();
    }

    // =========================================================================
    // Resource helpers
    // =========================================================================

    pub async fn project(&self, name: &str) -> Resource {
        let project = Resource::new(PROJECT_KIND, FqName::new(["default-domain", name]));
        self.persist(project).await
    }

    /// Virtual network under `project`
    pub async fn virtual_network(&self, project: &Resource, name: &str) -> Resource {
        self.persist(Resource::child_of(project, "virtual_network", name))
            .await
    }

    /// Parentless virtual machine owned by `project`
    pub async fn virtual_machine(&self, project: &Resource, name: &str) -> Resource {
        let vm = Resource::new("virtual_machine", FqName::new([name])).with_owner(project.uuid);
        self.persist(vm).await
    }

    /// Parentless resource without an owner
    pub async fn orphan(&self, name: &str) -> Resource {
        self.persist(Resource::new("virtual_machine", FqName::new([name])))
            .await
    }

    async fn persist(&self, resource: Resource) -> Resource {
        self.store
            .create(Object::Resource(resource.clone()))
            .await
            .expect("create resource");
        resource
    }

    /// Current stored state of a resource
    pub async fn reload(&self, uuid: Uuid) -> Resource {
        self.store
            .read(uuid)
            .await
            .expect("read resource")
            .into_resource()
            .expect("resource object")
    }

    /// Sorted values of `type_name` currently attached to a resource
    pub async fn values_of(&self, uuid: Uuid, type_name: &str) -> Vec<String> {
        let resource = self.reload(uuid).await;
        let mut values: Vec<String> = resource
            .refs_of_type(type_name)
            .map(|r| r.value.clone())
            .collect();
        values.sort();
        values
    }
}
