//! Tag registry integration tests

mod support;

use std::collections::BTreeSet;
use support::Harness;
use tagreg_api::{ApiError, TagCreate, TagUpdate, TAG_TYPE_LOCK_PATH};
use tagreg_coord::{now_unix_ms, AllocatorConfig, CoordinationError, CoordinationService, LockRecord};
use tagreg_core::{FqName, RequestContext, Scope, TagTypeId, TagValueId};

#[tokio::test]
async fn global_tag_names_are_composed() {
    let h = Harness::new().await;
    let tag = h
        .service
        .tags()
        .create(TagCreate {
            name: Some("whatever".into()),
            ..TagCreate::new("Foo", "bar")
        })
        .await
        .unwrap();

    assert_eq!(tag.type_name, "foo");
    assert_eq!(tag.value, "bar");
    assert_eq!(tag.name, "foo=bar");
    assert_eq!(tag.display_name, "foo=bar");
    assert_eq!(tag.fq_name, FqName::new(["foo=bar"]));
    assert_eq!(tag.scope, Scope::Global);
}

#[tokio::test]
async fn scoped_tag_lives_under_project() {
    let h = Harness::new().await;
    let project = h.project("alpha").await;
    let tag = h
        .service
        .tags()
        .create(TagCreate::new("application", "web").in_project(project.uuid))
        .await
        .unwrap();

    assert_eq!(tag.fq_name, FqName::new(["default-domain", "alpha", "application=web"]));
    assert_eq!(tag.fq_name.leaf(), "application=web");
    assert_eq!(tag.scope, Scope::Project(project.uuid));
    assert_eq!(
        h.service.tags().read_by_fq_name(&tag.fq_name).await.unwrap(),
        tag
    );
}

#[tokio::test]
async fn scope_must_be_an_existing_project() {
    let h = Harness::new().await;
    let project = h.project("alpha").await;
    let vn = h.virtual_network(&project, "vn").await;

    for parent in [vn.uuid, uuid::Uuid::new_v4()] {
        let err = h
            .service
            .tags()
            .create(TagCreate::new("application", "web").in_project(parent))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn create_rejects_missing_and_system_managed_fields() {
    let h = Harness::new().await;
    let tags = h.service.tags();

    let requests = [
        TagCreate {
            type_name: None,
            ..TagCreate::new("foo", "bar")
        },
        TagCreate {
            value: None,
            ..TagCreate::new("foo", "bar")
        },
        TagCreate {
            id: Some(0x0006_0000),
            ..TagCreate::new("foo", "bar")
        },
        TagCreate {
            tag_type_refs: vec![uuid::Uuid::new_v4()],
            ..TagCreate::new("foo", "bar")
        },
    ];
    for req in requests {
        let err = tags.create(req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }
    assert!(h
        .service
        .tag_types()
        .read_by_name("foo")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_in_same_scope_conflicts() {
    let h = Harness::new().await;
    let project = h.project("alpha").await;
    let tags = h.service.tags();

    tags.create(TagCreate::new("foo", "bar")).await.unwrap();
    let err = tags.create(TagCreate::new("foo", "bar")).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    tags.create(TagCreate::new("foo", "bar").in_project(project.uuid))
        .await
        .unwrap();
    let err = tags
        .create(TagCreate::new("foo", "bar").in_project(project.uuid))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn global_and_scoped_pair_are_independent() {
    let h = Harness::new().await;
    let project = h.project("alpha").await;
    let tags = h.service.tags();

    let global = tags.create(TagCreate::new("foo", "bar")).await.unwrap();
    let scoped = tags
        .create(TagCreate::new("foo", "bar").in_project(project.uuid))
        .await
        .unwrap();

    assert_ne!(global.uuid, scoped.uuid);
    assert_ne!(global.id, scoped.id);
    assert_eq!(global.tag_type_ref, scoped.tag_type_ref);
    assert_eq!(global.id.type_id(), scoped.id.type_id());
}

#[tokio::test]
async fn tag_id_packs_type_and_value_ids() {
    let h = Harness::new().await;
    let tags = h.service.tags();
    let first = tags.create(TagCreate::new("application", "web")).await.unwrap();
    let second = tags.create(TagCreate::new("application", "db")).await.unwrap();

    assert_eq!(first.id.type_id(), TagTypeId(1));
    assert_eq!(first.id.value_id(), TagValueId(0));
    assert_eq!(second.id.value_id(), TagValueId(1));
    assert_eq!(second.id.as_u32(), 0x0001_0001);
    assert_eq!(second.id.to_string(), "0x00010001");

    assert_eq!(
        h.service
            .tag_value_for_id("application", second.id.value_id())
            .await
            .unwrap()
            .as_deref(),
        Some("application=db")
    );
}

#[tokio::test]
async fn type_is_auto_created_and_auto_deleted() {
    let h = Harness::new().await;
    let tags = h.service.tags();
    let types = h.service.tag_types();

    let bar = tags.create(TagCreate::new("foo", "bar")).await.unwrap();
    let baz = tags.create(TagCreate::new("foo", "baz")).await.unwrap();
    let foo = types.read_by_name("foo").await.unwrap().unwrap();
    assert_eq!(bar.tag_type_ref, foo.uuid);
    assert!(!foo.user_visible);
    assert_eq!(types.reference_count(foo.uuid).await.unwrap(), 2);

    tags.delete(bar.uuid).await.unwrap();
    assert!(types.read_by_name("foo").await.unwrap().is_some());

    tags.delete(baz.uuid).await.unwrap();
    assert!(types.read_by_name("foo").await.unwrap().is_none());
    assert!(h.service.tag_type_name_for_id(foo.id).await.unwrap().is_none());
}

#[tokio::test]
async fn predefined_type_survives_last_tag_delete() {
    let h = Harness::new().await;
    let tag = h
        .service
        .tags()
        .create(TagCreate::new("tier", "gold"))
        .await
        .unwrap();
    h.service.tags().delete(tag.uuid).await.unwrap();
    assert!(h
        .service
        .tag_types()
        .read_by_name("tier")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn delete_releases_value_id() {
    let h = Harness::new().await;
    let tag = h
        .service
        .tags()
        .create(TagCreate::new("application", "web"))
        .await
        .unwrap();
    h.service.tags().delete(tag.uuid).await.unwrap();

    assert!(h
        .service
        .tag_value_for_id("application", tag.id.value_id())
        .await
        .unwrap()
        .is_none());
    let err = h.service.tags().read(tag.uuid).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn delete_keeps_value_slot_owned_by_someone_else() {
    let h = Harness::new().await;
    let tags = h.service.tags();
    let tag = tags.create(TagCreate::new("foo", "bar")).await.unwrap();

    let slot = tag.id.value_id().as_u16() as u32;
    let allocator = tags.value_allocator("foo");
    allocator.delete(slot).await.unwrap();
    allocator.reserve(slot, "fake-tag").await.unwrap();

    tags.delete(tag.uuid).await.unwrap();
    assert_eq!(
        h.service
            .tag_value_for_id("foo", tag.id.value_id())
            .await
            .unwrap()
            .as_deref(),
        Some("fake-tag")
    );
}

#[tokio::test]
async fn auto_delete_keeps_type_slot_owned_by_someone_else() {
    let h = Harness::new().await;
    let tag = h
        .service
        .tags()
        .create(TagCreate::new("foo", "bar"))
        .await
        .unwrap();
    let type_id = tag.id.type_id();
    let allocator = h.service.tag_types().id_allocator();
    allocator.delete(type_id.as_u16() as u32).await.unwrap();
    allocator
        .reserve(type_id.as_u16() as u32, "fake-type")
        .await
        .unwrap();

    h.service.tags().delete(tag.uuid).await.unwrap();
    assert!(h
        .service
        .tag_types()
        .read_by_name("foo")
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        h.service.tag_type_name_for_id(type_id).await.unwrap().as_deref(),
        Some("fake-type")
    );
}

#[tokio::test]
async fn update_rejects_immutable_fields() {
    let h = Harness::new().await;
    let tags = h.service.tags();
    let tag = tags.create(TagCreate::new("foo", "bar")).await.unwrap();

    let updates = [
        TagUpdate {
            type_name: Some("other".into()),
            ..TagUpdate::default()
        },
        TagUpdate {
            value: Some("other".into()),
            ..TagUpdate::default()
        },
        TagUpdate {
            id: Some(tag.id.as_u32() + 1),
            ..TagUpdate::default()
        },
        TagUpdate {
            tag_type_refs: Some(vec![]),
            ..TagUpdate::default()
        },
        TagUpdate {
            tag_type_refs: Some(vec![tag.tag_type_ref, uuid::Uuid::new_v4()]),
            ..TagUpdate::default()
        },
    ];
    for update in updates {
        let err = tags.update(tag.uuid, update).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }

    let updated = tags
        .update(
            tag.uuid,
            TagUpdate {
                value: Some("bar".into()),
                description: Some("front end".into()),
                ..TagUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("front end"));
    assert_eq!(tags.read(tag.uuid).await.unwrap(), updated);
}

#[tokio::test]
async fn delete_refused_while_resource_refers_to_tag() {
    let h = Harness::new().await;
    let project = h.project("alpha").await;
    let vn = h.virtual_network(&project, "vn").await;
    let tag = h
        .service
        .tags()
        .create(TagCreate::new("application", "web").in_project(project.uuid))
        .await
        .unwrap();
    h.service
        .associations()
        .set_tag(&RequestContext::admin(), vn.uuid, "application", "web", false)
        .await
        .unwrap();

    let err = h.service.tags().delete(tag.uuid).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    h.service
        .associations()
        .unset_tag(&RequestContext::admin(), vn.uuid, "application")
        .await
        .unwrap();
    h.service.tags().delete(tag.uuid).await.unwrap();
}

#[tokio::test]
async fn list_filters_by_scope() {
    let h = Harness::new().await;
    let alpha = h.project("alpha").await;
    let tags = h.service.tags();
    tags.create(TagCreate::new("foo", "a")).await.unwrap();
    tags.create(TagCreate::new("foo", "b").in_project(alpha.uuid))
        .await
        .unwrap();

    assert_eq!(tags.list(None).await.unwrap().len(), 2);
    let global = tags.list(Some(Scope::Global)).await.unwrap();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].name, "foo=a");
    let scoped = tags.list(Some(Scope::Project(alpha.uuid))).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].name, "foo=b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_ids() {
    let h = Harness::new().await;
    let mut handles = Vec::new();
    for i in 0..16 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .tags()
                .create(TagCreate::new("foo", format!("v{i}")))
                .await
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        let tag = handle.await.unwrap().unwrap();
        assert!(ids.insert(tag.id));
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(
        h.service
            .tag_types()
            .list(&RequestContext::admin())
            .await
            .unwrap()
            .iter()
            .filter(|t| t.name == "foo")
            .count(),
        1
    );
}

#[tokio::test]
async fn stale_type_lock_is_broken() {
    let h = Harness::with_config(AllocatorConfig::default().with_stale_lock_seconds(0.05)).await;
    let abandoned = LockRecord::new("crashed-holder", now_unix_ms() - 60_000);
    let key = format!("{TAG_TYPE_LOCK_PATH}/foo");
    assert!(h
        .coord
        .create(&key, &serde_json::to_string(&abandoned).unwrap())
        .await
        .unwrap());

    let tag = h
        .service
        .tags()
        .create(TagCreate::new("foo", "bar"))
        .await
        .unwrap();
    assert_eq!(tag.name, "foo=bar");
    assert!(h.coord.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn live_type_lock_times_out() {
    let h = Harness::with_config(
        AllocatorConfig::default()
            .with_stale_lock_seconds(60.0)
            .with_lock_acquire_timeout_ms(50),
    )
    .await;
    let held = LockRecord::new("live-holder", now_unix_ms());
    let key = format!("{TAG_TYPE_LOCK_PATH}/foo");
    h.coord
        .create(&key, &serde_json::to_string(&held).unwrap())
        .await
        .unwrap();

    let err = h
        .service
        .tags()
        .create(TagCreate::new("foo", "bar"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            ApiError::Coordination(CoordinationError::LockTimeout { .. })
        ),
        "got {err:?}"
    );
    assert_eq!(err.status_code(), 503);
}
