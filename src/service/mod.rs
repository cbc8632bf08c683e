//! The assembled service: both caches, the asset registry and the world
//! dispatchers, with one lifecycle.

mod builder;

use std::sync::Arc;

use tracing::info;

use crate::avatar::{AssetRegistry, AvatarCache};
use crate::cache::WorkerPool;
use crate::dispatch::{WorldDispatcherRegistry, WorldId};
use crate::profile::ProfileCache;

pub use builder::{Portray, PortrayBuilder};

/// A running instance, created by [`Portray::builder()`].
pub struct PortrayService {
    profiles: ProfileCache,
    avatars: AvatarCache,
    dispatchers: Arc<WorldDispatcherRegistry>,
    assets: Arc<dyn AssetRegistry>,
    pool: WorkerPool,
}

impl PortrayService {
    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    pub fn avatars(&self) -> &AvatarCache {
        &self.avatars
    }

    pub fn dispatchers(&self) -> &Arc<WorldDispatcherRegistry> {
        &self.dispatchers
    }

    pub fn assets(&self) -> &Arc<dyn AssetRegistry> {
        &self.assets
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Hook for the host's world-removed event.
    pub fn on_world_removed(&self, id: WorldId) {
        self.dispatchers.remove_world(&id);
    }

    /// Drop every cached entry and every dispatcher.
    ///
    /// Avatars go first so their assets are deregistered before the
    /// profiles they were rendered from. The service stays usable; later
    /// fetches recompute.
    pub async fn shutdown(&self) {
        self.avatars.invalidate_all();
        self.avatars.run_pending_tasks().await;
        self.profiles.invalidate_all();
        self.profiles.run_pending_tasks().await;
        self.dispatchers.clear();
        info!("portray service shut down");
    }
}

impl std::fmt::Debug for PortrayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortrayService")
            .field("profiles", &self.profiles.entry_count())
            .field("avatars", &self.avatars.entry_count())
            .field("worlds", &self.dispatchers.len())
            .field("pool", &self.pool)
            .finish()
    }
}
