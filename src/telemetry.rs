//! Telemetry metric name constants.
//!
//! Centralised metric names for portray caches. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `portray_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `cache`: cache name (e.g. "profiles", "avatars", "portraits")
//! - `status`: outcome of a source load: "ok", "absent" or "error"
//! - `cause`: eviction cause: "explicit", "replaced", "expired" or "size"

/// Total lookups answered from memory.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "portray_cache_hits_total";

/// Total lookups that had to wait on a source computation.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "portray_cache_misses_total";

/// Total source computations started (one per single-flight group).
///
/// Labels: `cache`, `status`.
pub const SOURCE_LOADS_TOTAL: &str = "portray_source_loads_total";

/// Total entries removed from a cache.
///
/// Labels: `cache`, `cause`.
pub const EVICTIONS_TOTAL: &str = "portray_evictions_total";

/// Total avatar assets published into the asset registry.
pub const ASSETS_PUBLISHED_TOTAL: &str = "portray_assets_published_total";

/// Total avatar assets removed from the asset registry.
pub const ASSETS_REMOVED_TOTAL: &str = "portray_assets_removed_total";
