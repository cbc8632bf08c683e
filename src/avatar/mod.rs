//! Avatar assets.
//!
//! [`AvatarCache`] turns `(player id, view)` into the path of a published
//! image asset. Each resident entry owns exactly one asset in the
//! [`AssetRegistry`]: the asset is published when the entry is computed and
//! removed by the cache's eviction hook when the entry leaves, so cache
//! capacity bounds registry memory one to one.
//!
//! Every publication carries a generation number. The hook only removes the
//! asset if the path still holds the generation its entry published: an
//! expired entry can be reloaded before its removal is processed, and that
//! late notification must not take the fresh asset with it.

pub mod asset;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::notification::RemovalCause;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheConfig, CacheSource, LoadThroughCache, WorkerPool};
use crate::profile::{PortraitView, ProfileCache};
use crate::{Result, telemetry};

pub use asset::{AssetRegistry, MemoryAsset, MemoryAssetRegistry};

/// Pack name reserved for avatar assets. Nothing else publishes into it.
pub const PACK_NAME: &str = "Portray:Avatars";

/// Default policy: 1,000 avatars, republished after 10 hours.
pub fn default_config() -> CacheConfig {
    CacheConfig::new()
        .max_entries(1_000)
        .time_to_live(Duration::from_secs(10 * 3600))
}

/// Key of an avatar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvatarKey {
    pub id: Uuid,
    pub view: PortraitView,
}

impl AvatarKey {
    pub fn new(id: Uuid, view: PortraitView) -> Self {
        Self { id, view }
    }

    /// Asset name this entry publishes under, unique per key.
    pub fn asset_path(&self) -> String {
        format!("Icons/PlayerAvatar/{}/{}.png", self.view.api_key(), self.id)
    }
}

/// One publication of an avatar asset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Published {
    path: String,
    generation: u64,
}

/// Asset path → generation currently published under it.
type LiveAssets = Arc<DashMap<String, u64>>;

/// Cache of published avatar asset paths.
///
/// Cloning is cheap and yields a handle onto the same cache.
#[derive(Clone)]
pub struct AvatarCache {
    avatars: LoadThroughCache<AvatarKey, Published>,
    assets: Arc<dyn AssetRegistry>,
}

impl AvatarCache {
    /// Start building an avatar cache resolving profiles through `profiles`
    /// and publishing into `assets`.
    pub fn builder(profiles: ProfileCache, assets: Arc<dyn AssetRegistry>) -> AvatarCacheBuilder {
        AvatarCacheBuilder {
            profiles,
            assets,
            config: default_config(),
            pool: None,
        }
    }

    /// Asset path for the avatar of `id` seen from `view`.
    ///
    /// `Ok(None)` when the profile does not exist or the renderer produced
    /// nothing; that absence is cached like a path.
    pub async fn fetch(&self, id: Uuid, view: PortraitView) -> Result<Option<String>> {
        let published = self.avatars.fetch(AvatarKey::new(id, view)).await?;
        Ok(published.map(|published| published.path))
    }

    /// Drop one avatar and its asset.
    pub async fn invalidate(&self, id: Uuid, view: PortraitView) {
        self.avatars.invalidate(&AvatarKey::new(id, view)).await;
    }

    /// Drop every avatar. Assets are removed once the removals are
    /// processed (see [`run_pending_tasks()`](Self::run_pending_tasks)).
    pub fn invalidate_all(&self) {
        self.avatars.invalidate_all();
    }

    /// Process pending expiry and removal notifications.
    pub async fn run_pending_tasks(&self) {
        self.avatars.run_pending_tasks().await;
    }

    pub fn contains(&self, id: Uuid, view: PortraitView) -> bool {
        self.avatars.contains(&AvatarKey::new(id, view))
    }

    /// Approximate number of resident avatars.
    pub fn entry_count(&self) -> u64 {
        self.avatars.entry_count()
    }

    /// Registry this cache publishes into.
    pub fn assets(&self) -> &Arc<dyn AssetRegistry> {
        &self.assets
    }
}

/// Builder for [`AvatarCache`].
pub struct AvatarCacheBuilder {
    profiles: ProfileCache,
    assets: Arc<dyn AssetRegistry>,
    config: CacheConfig,
    pool: Option<WorkerPool>,
}

impl AvatarCacheBuilder {
    /// Override the capacity and expiry policy.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Run avatar computations on `pool` (default: the current runtime).
    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<AvatarCache> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => WorkerPool::current()?,
        };

        let live: LiveAssets = Arc::new(DashMap::new());
        let registry = Arc::clone(&self.assets);
        let published = Arc::clone(&live);
        let avatars = LoadThroughCache::builder(
            "avatars",
            AvatarSource {
                profiles: self.profiles,
                assets: Arc::clone(&self.assets),
                live,
                generations: AtomicU64::new(0),
            },
        )
        .config(self.config)
        .pool(pool)
        .on_evict(move |key, entry, cause| {
            // A replacement republishes the same path.
            if matches!(cause, RemovalCause::Replaced) {
                return;
            }
            let Some(entry) = entry else { return };
            // The registry call runs under the shard lock, so a concurrent
            // reload cannot publish between the check and the removal.
            let mut removed = false;
            let current = published.remove_if(&entry.path, |_, generation| {
                if *generation != entry.generation {
                    return false;
                }
                removed = registry.remove(PACK_NAME, &entry.path);
                true
            });
            if current.is_none() {
                debug!(id = %key.id, view = %key.view, path = %entry.path, ?cause, "asset republished, kept");
            } else if removed {
                metrics::counter!(telemetry::ASSETS_REMOVED_TOTAL).increment(1);
                debug!(id = %key.id, view = %key.view, path = %entry.path, ?cause, "removed avatar asset");
            }
        })
        .build()?;

        Ok(AvatarCache {
            avatars,
            assets: self.assets,
        })
    }
}

/// Renders and publishes one avatar.
struct AvatarSource {
    profiles: ProfileCache,
    assets: Arc<dyn AssetRegistry>,
    live: LiveAssets,
    generations: AtomicU64,
}

#[async_trait]
impl CacheSource<AvatarKey, Published> for AvatarSource {
    async fn load(&self, key: &AvatarKey) -> Result<Option<Published>> {
        let Some(profile) = self.profiles.fetch_by_id(key.id).await? else {
            return Ok(None);
        };
        let Some(image) = profile.portrait(key.view).await? else {
            return Ok(None);
        };

        let path = key.asset_path();
        let size = image.len();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut slot = self.live.entry(path.clone()).or_insert(generation);
            self.assets.publish(PACK_NAME, &path, image);
            *slot = generation;
        }
        metrics::counter!(telemetry::ASSETS_PUBLISHED_TOTAL).increment(1);
        info!(id = %key.id, view = %key.view, %path, size, generation, "published avatar asset");
        Ok(Some(Published { path, generation }))
    }
}
