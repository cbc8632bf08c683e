//! Builder for configuring service instances

use std::sync::Arc;

use tracing::info;

use super::PortrayService;
use crate::avatar::{self, AssetRegistry, AvatarCache, MemoryAssetRegistry};
use crate::cache::{CacheConfig, WorkerPool};
use crate::config::{HttpConfig, PortrayConfig};
use crate::dispatch::WorldDispatcherRegistry;
use crate::profile::{
    self, HttpIdentityService, HttpPortraitRenderer, IdentityService, PortraitRenderer,
    ProfileCache,
};
use crate::{Result, version};

/// Main entry point for creating service instances.
pub struct Portray;

impl Portray {
    /// Create a new builder for configuring the service.
    pub fn builder() -> PortrayBuilder {
        PortrayBuilder::new()
    }
}

/// Builder for configuring service instances.
///
/// Every collaborator is optional. Unset clients are built over HTTP from
/// [`http()`](Self::http) settings, and the asset registry defaults to a
/// [`MemoryAssetRegistry`].
pub struct PortrayBuilder {
    identity: Option<Arc<dyn IdentityService>>,
    renderer: Option<Arc<dyn PortraitRenderer>>,
    assets: Option<Arc<dyn AssetRegistry>>,
    pool: Option<WorkerPool>,
    worker_threads: Option<usize>,
    profile_config: CacheConfig,
    avatar_config: CacheConfig,
    http: HttpConfig,
}

impl PortrayBuilder {
    pub fn new() -> Self {
        Self {
            identity: None,
            renderer: None,
            assets: None,
            pool: None,
            worker_threads: None,
            profile_config: profile::cache::default_config(),
            avatar_config: avatar::default_config(),
            http: HttpConfig::default(),
        }
    }

    /// Take cache policies, HTTP settings and pool size from a loaded
    /// configuration.
    pub fn from_config(mut self, config: &PortrayConfig) -> Self {
        self.profile_config = config.profile_cache();
        self.avatar_config = config.avatar_cache();
        self.http = config.http.clone();
        self.worker_threads = config.pool.worker_threads;
        self
    }

    /// Resolve profiles through `identity` instead of the HTTP client.
    pub fn identity(mut self, identity: Arc<dyn IdentityService>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Render portraits through `renderer` instead of the HTTP client.
    pub fn renderer(mut self, renderer: Arc<dyn PortraitRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Publish avatars into the host's registry.
    pub fn assets(mut self, assets: Arc<dyn AssetRegistry>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Run source computations on `pool`. Takes precedence over
    /// [`worker_threads()`](Self::worker_threads).
    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Run source computations on a dedicated pool of `n` threads.
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = Some(n);
        self
    }

    pub fn profile_cache(mut self, config: CacheConfig) -> Self {
        self.profile_config = config;
        self
    }

    pub fn avatar_cache(mut self, config: CacheConfig) -> Self {
        self.avatar_config = config;
        self
    }

    /// Settings for the default HTTP clients.
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Build the service.
    ///
    /// Without an explicit pool or thread count this must be called from
    /// within a tokio runtime.
    pub fn build(self) -> Result<PortrayService> {
        let pool = match (self.pool, self.worker_threads) {
            (Some(pool), _) => pool,
            (None, Some(n)) => WorkerPool::new(n)?,
            (None, None) => WorkerPool::current()?,
        };

        let identity: Arc<dyn IdentityService> = match self.identity {
            Some(identity) => identity,
            None => Arc::new(HttpIdentityService::new(&self.http)?),
        };
        let renderer: Arc<dyn PortraitRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(HttpPortraitRenderer::new(&self.http)?),
        };
        let assets: Arc<dyn AssetRegistry> = match self.assets {
            Some(assets) => assets,
            None => Arc::new(MemoryAssetRegistry::new()),
        };

        let profiles = ProfileCache::builder(identity, renderer)
            .config(self.profile_config)
            .pool(pool.clone())
            .build()?;
        let avatars = AvatarCache::builder(profiles.clone(), Arc::clone(&assets))
            .config(self.avatar_config)
            .pool(pool.clone())
            .build()?;

        info!(
            version = %version::version_string(),
            dedicated_pool = pool.is_dedicated(),
            "portray service ready"
        );

        Ok(PortrayService {
            profiles,
            avatars,
            dispatchers: Arc::new(WorldDispatcherRegistry::new()),
            assets,
            pool,
        })
    }
}

impl Default for PortrayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
