//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

mod common;

use std::sync::Arc;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use common::{FakeIdentity, FakeRenderer};
use portray::avatar::{AvatarCache, MemoryAssetRegistry};
use portray::cache::{LoadThroughCache, source_fn};
use portray::profile::{PortraitView, ProfileCache};
use portray::{PortrayError, telemetry};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a metric name and every given label.
fn counter_total(snapshot: &SnapshotVec, name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            labels.iter().all(|(k, v)| {
                key.key()
                    .labels()
                    .any(|label| label.key() == *k && label.value() == *v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Run `f` on a current-thread runtime inside a local recorder scope.
///
/// Local recorders are per thread, so source computations spawned on the
/// worker pool must run on the same thread as the test body.
fn record<F, Fut>(f: F) -> SnapshotVec
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    metrics::with_local_recorder(&recorder, || runtime.block_on(f()));
    snapshotter.snapshot().into_vec()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn hits_misses_and_loads_are_counted() {
    let snapshot = record(|| async {
        let cache = LoadThroughCache::<u32, u32>::builder(
            "counted",
            source_fn(|n: u32| async move { Ok(Some(n)) }),
        )
        .build()
        .unwrap();
        cache.fetch(1).await.unwrap();
        cache.fetch(1).await.unwrap();
        cache.fetch(1).await.unwrap();
        cache.fetch(2).await.unwrap();
    });

    let cache = [("cache", "counted")];
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, &cache), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL, &cache), 2);
    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::SOURCE_LOADS_TOTAL,
            &[("cache", "counted"), ("status", "ok")]
        ),
        2
    );
}

#[test]
fn load_status_distinguishes_absence_and_failure() {
    let snapshot = record(|| async {
        let cache = LoadThroughCache::<u32, u32>::builder(
            "statuses",
            source_fn(|n: u32| async move {
                match n {
                    0 => Ok(None),
                    _ => Err(PortrayError::Http("refused".to_string())),
                }
            }),
        )
        .build()
        .unwrap();
        cache.fetch(0).await.unwrap();
        let _ = cache.fetch(1).await;
    });

    assert_eq!(
        counter_total(&snapshot, telemetry::SOURCE_LOADS_TOTAL, &[("status", "absent")]),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::SOURCE_LOADS_TOTAL, &[("status", "error")]),
        1
    );
}

#[test]
fn evictions_are_labelled_by_cause() {
    let snapshot = record(|| async {
        let cache = LoadThroughCache::<u32, u32>::builder(
            "evicting",
            source_fn(|n: u32| async move { Ok(Some(n)) }),
        )
        .build()
        .unwrap();
        cache.fetch(1).await.unwrap();
        cache.invalidate(&1).await;
        cache.run_pending_tasks().await;
    });

    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::EVICTIONS_TOTAL,
            &[("cache", "evicting"), ("cause", "explicit")]
        ),
        1
    );
}

#[test]
fn avatar_publish_and_removal_are_counted() {
    let snapshot = record(|| async {
        let identity = Arc::new(FakeIdentity::new());
        let alice = identity.add("Alice");
        let profiles = ProfileCache::builder(identity, Arc::new(FakeRenderer::new()))
            .build()
            .unwrap();
        let avatars = AvatarCache::builder(profiles, Arc::new(MemoryAssetRegistry::new()))
            .build()
            .unwrap();

        avatars.fetch(alice, PortraitView::Face).await.unwrap();
        avatars.fetch(alice, PortraitView::Face).await.unwrap();
        avatars.invalidate(alice, PortraitView::Face).await;
        avatars.run_pending_tasks().await;
    });

    assert_eq!(counter_total(&snapshot, telemetry::ASSETS_PUBLISHED_TOTAL, &[]), 1);
    assert_eq!(counter_total(&snapshot, telemetry::ASSETS_REMOVED_TOTAL, &[]), 1);
    assert_eq!(
        counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL, &[("cache", "avatars")]),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let cache = LoadThroughCache::<u32, u32>::builder(
        "silent",
        source_fn(|n: u32| async move { Ok(Some(n)) }),
    )
    .build()
    .unwrap();
    cache.fetch(1).await.unwrap();
}
