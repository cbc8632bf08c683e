//! Generic load-through cache.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::{debug, warn};

use super::flight::SingleFlight;
use super::{CacheConfig, WorkerPool};
use crate::telemetry;
use crate::Result;

/// Computes the value for a key on a cache miss.
///
/// `Ok(None)` means the source confirmed the key does not exist; that
/// absence is cached like a value. Errors are handed to every waiter and
/// never cached.
#[async_trait]
pub trait CacheSource<K, V>: Send + Sync {
    async fn load(&self, key: &K) -> Result<Option<V>>;
}

/// Adapter turning an async closure into a [`CacheSource`].
pub struct FnSource<F>(F);

/// Build a [`CacheSource`] from an async closure taking the key by value.
///
/// ```rust
/// # use portray::cache::source_fn;
/// let source = source_fn(|id: u32| async move { Ok(Some(id.to_string())) });
/// ```
pub fn source_fn<K, V, F, Fut>(f: F) -> FnSource<F>
where
    F: Fn(K) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<V>>> + Send,
{
    FnSource(f)
}

#[async_trait]
impl<K, V, F, Fut> CacheSource<K, V> for FnSource<F>
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<V>>> + Send,
{
    async fn load(&self, key: &K) -> Result<Option<V>> {
        (self.0)(key.clone()).await
    }
}

/// Callback run with every entry removed from a [`LoadThroughCache`].
///
/// Receives the key, the cached value (`None` for a cached absence) and
/// why it was removed. Called at most once per removed entry.
pub type EvictionListener<K, V> = Arc<dyn Fn(Arc<K>, Option<V>, RemovalCause) + Send + Sync>;

/// Async cache that knows how to compute its own misses.
///
/// - Concurrent misses for one key share a single source computation,
///   executed on the cache's [`WorkerPool`].
/// - Successful results, including confirmed absence, are stored subject
///   to the size and expiry policy in [`CacheConfig`].
/// - Failures reach every waiter and are not stored; the next
///   [`fetch()`](Self::fetch) retries.
/// - Removals of any kind are reported to the optional
///   [`EvictionListener`].
///
/// Cloning is cheap and yields a handle onto the same cache.
pub struct LoadThroughCache<K, V> {
    name: Arc<str>,
    entries: Cache<K, Option<V>>,
    source: Arc<dyn CacheSource<K, V>>,
    flight: SingleFlight<K, Option<V>>,
    pool: WorkerPool,
}

impl<K, V> Clone for LoadThroughCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            entries: self.entries.clone(),
            source: Arc::clone(&self.source),
            flight: self.flight.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<K, V> LoadThroughCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Start building a cache named `name` (used in logs and metrics).
    pub fn builder(
        name: impl Into<String>,
        source: impl CacheSource<K, V> + 'static,
    ) -> LoadThroughCacheBuilder<K, V> {
        LoadThroughCacheBuilder {
            name: name.into(),
            source: Arc::new(source),
            config: CacheConfig::default(),
            pool: None,
            listener: None,
        }
    }

    /// Cache name, as given to the builder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the cached result for `key`, computing it on a miss.
    ///
    /// Suspends until a result is available. Dropping the returned future
    /// abandons only this caller's wait; the computation keeps running for
    /// everyone else and still populates the cache.
    pub async fn fetch(&self, key: K) -> Result<Option<V>> {
        if let Some(value) = self.entries.get(&key).await {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name.to_string())
                .increment(1);
            return Ok(value);
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.to_string())
            .increment(1);

        let entries = self.entries.clone();
        let source = Arc::clone(&self.source);
        let name = Arc::clone(&self.name);
        self.flight
            .join_or_start(key, &self.pool, move |key| async move {
                // Settled between our miss and registering the flight.
                if let Some(value) = entries.get(&key).await {
                    return Ok(value);
                }
                let result = source.load(&key).await;
                let status = match &result {
                    Ok(Some(_)) => "ok",
                    Ok(None) => "absent",
                    Err(_) => "error",
                };
                metrics::counter!(telemetry::SOURCE_LOADS_TOTAL,
                    "cache" => name.to_string(),
                    "status" => status,
                )
                .increment(1);
                match &result {
                    Ok(value) => {
                        debug!(cache = %name, status, "source load settled");
                        entries.insert(key, value.clone()).await;
                    }
                    Err(e) => warn!(cache = %name, error = %e, "source load failed"),
                }
                result
            })
            .await
    }

    /// Look up `key` without ever invoking the source.
    ///
    /// Returns `None` on a miss and `Some(None)` for a cached absence.
    pub async fn get_if_present(&self, key: &K) -> Option<Option<V>> {
        self.entries.get(key).await
    }

    /// Whether `key` currently has a settled, unexpired entry.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Install `value` as if the source had just produced it.
    pub async fn put(&self, key: K, value: V) {
        self.entries.insert(key, Some(value)).await;
    }

    /// Remove the entry for `key`, if any.
    pub async fn invalidate(&self, key: &K) {
        self.entries.invalidate(key).await;
    }

    /// Remove every entry.
    ///
    /// Removal notifications for these entries are delivered by the next
    /// maintenance pass; call [`run_pending_tasks()`](Self::run_pending_tasks)
    /// to flush them immediately.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Run pending maintenance: expire entries, enforce capacity and
    /// deliver removal notifications.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// Approximate number of resident entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Number of source computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flight.len()
    }
}

/// Builder for [`LoadThroughCache`].
pub struct LoadThroughCacheBuilder<K, V> {
    name: String,
    source: Arc<dyn CacheSource<K, V>>,
    config: CacheConfig,
    pool: Option<WorkerPool>,
    listener: Option<EvictionListener<K, V>>,
}

impl<K, V> LoadThroughCacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Set capacity and expiry policy.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Run source computations on `pool` (default: the current runtime).
    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Call `listener` with every removed entry.
    pub fn on_evict<F>(mut self, listener: F) -> Self
    where
        F: Fn(Arc<K>, Option<V>, RemovalCause) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Validate the configuration and build the cache.
    pub fn build(self) -> Result<LoadThroughCache<K, V>> {
        self.config.validate()?;
        let pool = match self.pool {
            Some(pool) => pool,
            None => WorkerPool::current()?,
        };

        let name: Arc<str> = Arc::from(self.name);
        let mut builder = Cache::builder()
            .name(&name)
            .max_capacity(self.config.max_entries);
        if let Some(ttl) = self.config.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = self.config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        let listener = self.listener;
        let cache_name = Arc::clone(&name);
        let entries = builder
            .eviction_listener(move |key, value, cause| {
                metrics::counter!(telemetry::EVICTIONS_TOTAL,
                    "cache" => cache_name.to_string(),
                    "cause" => cause_label(cause),
                )
                .increment(1);
                if let Some(listener) = &listener {
                    listener(key, value, cause);
                }
            })
            .build();

        Ok(LoadThroughCache {
            name,
            entries,
            source: self.source,
            flight: SingleFlight::new(),
            pool,
        })
    }
}

fn cause_label(cause: RemovalCause) -> &'static str {
    match cause {
        RemovalCause::Explicit => "explicit",
        RemovalCause::Replaced => "replaced",
        RemovalCause::Expired => "expired",
        RemovalCause::Size => "size",
    }
}
