//! Tests for [`ProfileCache`]: id and name lookups, the name index and
//! per-profile portrait caching.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use uuid::Uuid;

use common::{FakeIdentity, FakeRenderer};
use portray::cache::CacheConfig;
use portray::PortrayError;
use portray::profile::{PortraitView, ProfileCache};

fn build(identity: &Arc<FakeIdentity>, renderer: &Arc<FakeRenderer>) -> ProfileCache {
    build_with(identity, renderer, portray::profile::cache::default_config())
}

fn build_with(
    identity: &Arc<FakeIdentity>,
    renderer: &Arc<FakeRenderer>,
    config: CacheConfig,
) -> ProfileCache {
    ProfileCache::builder(identity.clone(), renderer.clone())
        .config(config)
        .build()
        .unwrap()
}

// =============================================================================
// Lookup by id
// =============================================================================

#[tokio::test]
async fn fetch_by_id_loads_once() {
    let identity = Arc::new(FakeIdentity::new());
    let renderer = Arc::new(FakeRenderer::new());
    let alice = identity.add("Alice");
    let cache = build(&identity, &renderer);

    let first = cache.fetch_by_id(alice).await.unwrap().unwrap();
    let second = cache.fetch_by_id(alice).await.unwrap().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.username(), "Alice");
    assert_eq!(first.skin(), "skin-of-Alice");
    assert_eq!(identity.id_calls(), 1);
}

#[tokio::test]
async fn unknown_id_is_cached_as_absent() {
    let identity = Arc::new(FakeIdentity::new());
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));
    let ghost = Uuid::new_v4();

    assert!(cache.fetch_by_id(ghost).await.unwrap().is_none());
    assert!(cache.fetch_by_id(ghost).await.unwrap().is_none());
    assert_eq!(identity.id_calls(), 1);
}

#[tokio::test]
async fn fetch_by_id_indexes_the_name() {
    let identity = Arc::new(FakeIdentity::new());
    let alice = identity.add("Alice");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    cache.fetch_by_id(alice).await.unwrap();
    assert_eq!(cache.cached_id_for_name("ALICE"), Some(alice));

    let by_name = cache.fetch_by_name("alice").await.unwrap().unwrap();
    assert_eq!(by_name.id(), alice);
    assert_eq!(identity.name_calls(), 0);
}

#[tokio::test]
async fn transient_failure_is_retried_on_next_fetch() {
    let identity = Arc::new(FakeIdentity::new());
    let alice = identity.add("Alice");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    identity.set_failing(true);
    let err = cache.fetch_by_id(alice).await.unwrap_err();
    assert!(err.is_transient());
    assert!(!cache.contains(&alice));

    identity.set_failing(false);
    assert!(cache.fetch_by_id(alice).await.unwrap().is_some());
    assert_eq!(identity.id_calls(), 2);
}

#[tokio::test]
async fn timeout_fails_every_waiter_and_is_not_cached() {
    let identity = Arc::new(FakeIdentity::with_delay(Duration::from_millis(50)));
    let alice = identity.add("Alice");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    identity.set_timing_out(true);
    let (first, second) = tokio::join!(cache.fetch_by_id(alice), cache.fetch_by_id(alice));
    for result in [first, second] {
        assert!(matches!(result, Err(PortrayError::Timeout(_))));
    }
    assert_eq!(identity.id_calls(), 1);
    assert!(!cache.contains(&alice));
    assert_eq!(cache.cached_id_for_name("alice"), None);

    identity.set_timing_out(false);
    let profile = cache.fetch_by_id(alice).await.unwrap().unwrap();
    assert_eq!(profile.id(), alice);
    assert_eq!(identity.id_calls(), 2);
}

// =============================================================================
// Lookup by name
// =============================================================================

#[tokio::test]
async fn name_lookup_is_case_insensitive_and_fills_the_primary_cache() {
    let identity = Arc::new(FakeIdentity::new());
    let alice = identity.add("Alice");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    let profile = cache.fetch_by_name("aLiCe").await.unwrap().unwrap();
    assert_eq!(profile.id(), alice);
    assert_eq!(profile.username(), "Alice");

    cache.fetch_by_name("ALICE").await.unwrap().unwrap();
    cache.fetch_by_id(alice).await.unwrap().unwrap();

    assert_eq!(identity.name_calls(), 1);
    assert_eq!(identity.id_calls(), 0);
    assert_eq!(cache.indexed_names(), 1);
}

#[tokio::test]
async fn concurrent_name_lookups_share_one_resolution() {
    let identity = Arc::new(FakeIdentity::with_delay(Duration::from_millis(50)));
    identity.add("Bob");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    let names = ["bob", "BOB", "Bob", "bOb"];
    let results = join_all(names.iter().map(|name| cache.fetch_by_name(name))).await;

    assert_eq!(identity.name_calls(), 1);
    let ids: Vec<Uuid> = results.into_iter().map(|r| r.unwrap().unwrap().id()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert!(!cache.is_resolving("bob"));
}

#[tokio::test]
async fn unknown_name_is_not_remembered() {
    let identity = Arc::new(FakeIdentity::new());
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    assert!(cache.fetch_by_name("nobody").await.unwrap().is_none());
    assert!(cache.fetch_by_name("nobody").await.unwrap().is_none());

    assert_eq!(identity.name_calls(), 2);
    assert_eq!(cache.cached_id_for_name("nobody"), None);
}

#[tokio::test]
async fn failed_name_resolution_is_shared_then_forgotten() {
    let identity = Arc::new(FakeIdentity::with_delay(Duration::from_millis(30)));
    identity.add("Carol");
    identity.set_failing(true);
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    let results = join_all((0..3).map(|_| cache.fetch_by_name("carol"))).await;
    assert!(results.iter().all(|r| r.as_ref().is_err_and(|e| e.is_transient())));
    assert_eq!(identity.name_calls(), 1);

    identity.set_failing(false);
    assert!(cache.fetch_by_name("carol").await.unwrap().is_some());
    assert_eq!(identity.name_calls(), 2);
}

// =============================================================================
// Name index follows the primary cache
// =============================================================================

#[tokio::test]
async fn invalidating_a_profile_drops_its_name() {
    let identity = Arc::new(FakeIdentity::new());
    let alice = identity.add("Alice");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    cache.fetch_by_name("alice").await.unwrap();
    cache.invalidate(&alice).await;
    cache.run_pending_tasks().await;

    assert_eq!(cache.cached_id_for_name("alice"), None);
    assert_eq!(cache.indexed_names(), 0);

    cache.fetch_by_name("alice").await.unwrap().unwrap();
    assert_eq!(identity.name_calls(), 2);
}

#[tokio::test]
async fn expired_profile_is_not_served_through_the_index() {
    let identity = Arc::new(FakeIdentity::new());
    identity.add("Dave");
    let cache = build_with(
        &identity,
        &Arc::new(FakeRenderer::new()),
        CacheConfig::new().time_to_idle(Duration::from_millis(100)),
    );

    cache.fetch_by_name("dave").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    // Expired, but the removal has not been processed yet.
    assert!(cache.fetch_by_name("dave").await.unwrap().is_some());
    assert_eq!(identity.name_calls(), 2);
}

#[tokio::test]
async fn expiry_empties_the_index() {
    let identity = Arc::new(FakeIdentity::new());
    identity.add("Erin");
    identity.add("Frank");
    let cache = build_with(
        &identity,
        &Arc::new(FakeRenderer::new()),
        CacheConfig::new().time_to_live(Duration::from_millis(100)),
    );

    cache.fetch_by_name("erin").await.unwrap();
    cache.fetch_by_name("frank").await.unwrap();
    assert_eq!(cache.indexed_names(), 2);

    tokio::time::sleep(Duration::from_millis(250)).await;
    cache.run_pending_tasks().await;

    assert_eq!(cache.entry_count(), 0);
    assert_eq!(cache.indexed_names(), 0);
}

#[tokio::test]
async fn invalidate_all_clears_the_index() {
    let identity = Arc::new(FakeIdentity::new());
    let ids: Vec<Uuid> = ["a", "b", "c"].iter().map(|n| identity.add(n)).collect();
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    for id in &ids {
        cache.fetch_by_id(*id).await.unwrap();
    }
    assert_eq!(cache.indexed_names(), 3);

    cache.invalidate_all();
    cache.run_pending_tasks().await;
    assert_eq!(cache.indexed_names(), 0);
}

#[tokio::test]
async fn size_eviction_never_leaves_dangling_names() {
    let identity = Arc::new(FakeIdentity::new());
    let names = ["p1", "p2", "p3", "p4", "p5", "p6"];
    for name in names {
        identity.add(name);
    }
    let cache = build_with(
        &identity,
        &Arc::new(FakeRenderer::new()),
        CacheConfig::new().max_entries(2),
    );

    for name in names {
        cache.fetch_by_name(name).await.unwrap();
    }
    cache.run_pending_tasks().await;

    for name in names {
        if let Some(id) = cache.cached_id_for_name(name) {
            assert!(cache.contains(&id), "{name} maps to an evicted profile");
        }
    }
}

// =============================================================================
// Portraits
// =============================================================================

#[tokio::test]
async fn each_view_is_rendered_once_per_profile() {
    let identity = Arc::new(FakeIdentity::new());
    let renderer = Arc::new(FakeRenderer::with_delay(Duration::from_millis(20)));
    let alice = identity.add("Alice");
    let cache = build(&identity, &renderer);
    let profile = cache.fetch_by_id(alice).await.unwrap().unwrap();

    let faces = join_all((0..5).map(|_| profile.portrait(PortraitView::Face))).await;
    for face in faces {
        assert_eq!(
            face.unwrap().unwrap(),
            FakeRenderer::image("skin-of-Alice", PortraitView::Face)
        );
    }
    assert_eq!(renderer.calls(), 1);

    for view in PortraitView::ALL {
        profile.portrait(view).await.unwrap();
    }
    assert_eq!(renderer.calls(), PortraitView::ALL.len());
    assert_eq!(profile.portraits().entry_count(), PortraitView::ALL.len() as u64);
}

#[tokio::test]
async fn blank_render_is_cached_as_absent() {
    let identity = Arc::new(FakeIdentity::new());
    let renderer = Arc::new(FakeRenderer::new());
    renderer.blank(PortraitView::Back);
    let alice = identity.add("Alice");
    let cache = build(&identity, &renderer);
    let profile = cache.fetch_by_id(alice).await.unwrap().unwrap();

    assert!(profile.portrait(PortraitView::Back).await.unwrap().is_none());
    assert!(profile.portrait(PortraitView::Back).await.unwrap().is_none());
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn record_round_trips_identity_fields() {
    let identity = Arc::new(FakeIdentity::new());
    let alice = identity.add("Alice");
    let cache = build(&identity, &Arc::new(FakeRenderer::new()));

    let record = cache.fetch_by_id(alice).await.unwrap().unwrap().record();
    assert_eq!(record.uuid, alice);
    assert_eq!(record.username, "Alice");
    assert_eq!(record.skin, "skin-of-Alice");
}
