//! Dual-keyed profile cache.
//!
//! Profiles are stored once, keyed by stable id. Display names reach them
//! through a secondary index (lower-cased name → id) that only ever points
//! at ids resident in the primary cache:
//!
//! - successful lookups write the index,
//! - evicting a profile removes its name from the index,
//! - an index hit whose target has already expired is treated as a miss.
//!
//! Name lookups that miss the index go through a single-flight resolver
//! keyed by the lower-cased name. A resolved profile is `put` straight into
//! the primary cache, so resolving by name never triggers a second fetch
//! by id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::{IdentityService, PortraitRenderer, Profile, ProfileFactory};
use crate::Result;
use crate::cache::flight::SingleFlight;
use crate::cache::{CacheConfig, CacheSource, LoadThroughCache, RemovalCause, WorkerPool};

/// Default policy: 1,000 profiles, dropped after 10 idle minutes.
pub fn default_config() -> CacheConfig {
    CacheConfig::new()
        .max_entries(1_000)
        .time_to_idle(Duration::from_secs(10 * 60))
}

/// Profile cache keyed by id, with case-insensitive lookup by name.
///
/// Cloning is cheap and yields a handle onto the same cache.
#[derive(Clone)]
pub struct ProfileCache {
    profiles: LoadThroughCache<Uuid, Arc<Profile>>,
    names: Arc<DashMap<String, Uuid>>,
    pending: SingleFlight<String, Option<Arc<Profile>>>,
    identity: Arc<dyn IdentityService>,
    factory: ProfileFactory,
    pool: WorkerPool,
}

impl ProfileCache {
    /// Start building a profile cache backed by `identity`, rendering
    /// portraits through `renderer`.
    pub fn builder(
        identity: Arc<dyn IdentityService>,
        renderer: Arc<dyn PortraitRenderer>,
    ) -> ProfileCacheBuilder {
        ProfileCacheBuilder {
            identity,
            renderer,
            config: default_config(),
            pool: None,
        }
    }

    /// Fetch a profile by stable id.
    pub async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Arc<Profile>>> {
        let profile = self.profiles.fetch(id).await?;
        if let Some(profile) = &profile {
            self.names.insert(normalize(profile.username()), profile.id());
        }
        Ok(profile)
    }

    /// Fetch a profile by display name, ignoring case.
    ///
    /// Concurrent lookups of the same name (in any casing) share one
    /// resolution. A failed or empty resolution is not remembered; the next
    /// call asks the identity service again.
    pub async fn fetch_by_name(&self, name: &str) -> Result<Option<Arc<Profile>>> {
        let key = normalize(name);

        if let Some(id) = self.names.get(&key).map(|entry| *entry.value()) {
            if self.profiles.contains(&id) {
                return self.fetch_by_id(id).await;
            }
            // Target expired before its removal was processed.
            self.names.remove_if(&key, |_, target| *target == id);
        }

        let identity = Arc::clone(&self.identity);
        let factory = self.factory.clone();
        let profiles = self.profiles.clone();
        let names = Arc::clone(&self.names);
        let requested = name.to_owned();
        self.pending
            .join_or_start(key, &self.pool, move |_| async move {
                let Some(record) = identity.by_name(&requested).await? else {
                    debug!(name = %requested, "no profile for name");
                    return Ok(None);
                };
                let profile = factory.build(record)?;
                profiles.put(profile.id(), Arc::clone(&profile)).await;
                names.insert(normalize(profile.username()), profile.id());
                debug!(name = %requested, id = %profile.id(), "resolved name");
                Ok(Some(profile))
            })
            .await
    }

    /// Id the secondary index currently maps `name` to, without any I/O.
    pub fn cached_id_for_name(&self, name: &str) -> Option<Uuid> {
        self.names.get(&normalize(name)).map(|entry| *entry.value())
    }

    /// Whether a resolution for `name` is in flight.
    pub fn is_resolving(&self, name: &str) -> bool {
        self.pending.is_pending(&normalize(name))
    }

    /// Whether the profile for `id` is resident.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.profiles.contains(id)
    }

    /// Drop the profile for `id` (and its name mapping).
    pub async fn invalidate(&self, id: &Uuid) {
        self.profiles.invalidate(id).await;
    }

    /// Drop every profile. Name mappings follow once the removals are
    /// processed (see [`run_pending_tasks()`](Self::run_pending_tasks)).
    pub fn invalidate_all(&self) {
        self.profiles.invalidate_all();
    }

    /// Process pending expiry and removal notifications.
    pub async fn run_pending_tasks(&self) {
        self.profiles.run_pending_tasks().await;
    }

    /// Approximate number of resident profiles.
    pub fn entry_count(&self) -> u64 {
        self.profiles.entry_count()
    }

    /// Number of names in the secondary index.
    pub fn indexed_names(&self) -> usize {
        self.names.len()
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Builder for [`ProfileCache`].
pub struct ProfileCacheBuilder {
    identity: Arc<dyn IdentityService>,
    renderer: Arc<dyn PortraitRenderer>,
    config: CacheConfig,
    pool: Option<WorkerPool>,
}

impl ProfileCacheBuilder {
    /// Override the capacity and expiry policy.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Run lookups and renders on `pool` (default: the current runtime).
    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<ProfileCache> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => WorkerPool::current()?,
        };
        let factory = ProfileFactory::new(self.renderer, pool.clone());
        let names: Arc<DashMap<String, Uuid>> = Arc::new(DashMap::new());

        let index = Arc::clone(&names);
        let profiles = LoadThroughCache::builder(
            "profiles",
            IdentitySource {
                identity: Arc::clone(&self.identity),
                factory: factory.clone(),
            },
        )
        .config(self.config)
        .pool(pool.clone())
        .on_evict(move |id, profile, cause| {
            // The replacement is resident under the same id.
            if matches!(cause, RemovalCause::Replaced) {
                return;
            }
            let Some(profile) = profile else { return };
            let key = normalize(profile.username());
            if index.remove_if(&key, |_, target| *target == *id).is_some() {
                debug!(%id, name = %key, ?cause, "dropped name mapping");
            }
        })
        .build()?;

        Ok(ProfileCache {
            profiles,
            names,
            pending: SingleFlight::new(),
            identity: self.identity,
            factory,
            pool,
        })
    }
}

/// Primary-cache source: fetch by id.
struct IdentitySource {
    identity: Arc<dyn IdentityService>,
    factory: ProfileFactory,
}

#[async_trait]
impl CacheSource<Uuid, Arc<Profile>> for IdentitySource {
    async fn load(&self, id: &Uuid) -> Result<Option<Arc<Profile>>> {
        match self.identity.by_id(*id).await? {
            Some(record) => Ok(Some(self.factory.build(record)?)),
            None => Ok(None),
        }
    }
}
