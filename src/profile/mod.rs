//! Player profiles.
//!
//! A [`Profile`] is the cached form of a [`ProfileRecord`] fetched from the
//! [`IdentityService`]. Besides the identity fields it owns a small
//! portrait cache, one slot per [`PortraitView`], so rendering the same
//! view of the same profile twice never calls the renderer again. That
//! sub-cache lives and dies with the profile's entry in the
//! [`ProfileCache`].

pub mod cache;
pub mod client;
pub mod portrait;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::cache::{CacheConfig, LoadThroughCache, WorkerPool};

pub use cache::{ProfileCache, ProfileCacheBuilder};
pub use client::{HttpIdentityService, IdentityService};
pub use portrait::{HttpPortraitRenderer, PortraitRenderer, PortraitView};

use portrait::PortraitSource;

/// Profile as returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub uuid: Uuid,
    pub username: String,
    /// Opaque skin descriptor, handed to the renderer as-is.
    #[serde(rename = "skin")]
    pub skin: String,
}

impl ProfileRecord {
    pub fn new(uuid: Uuid, username: impl Into<String>, skin: impl Into<String>) -> Self {
        Self {
            uuid,
            username: username.into(),
            skin: skin.into(),
        }
    }
}

/// A resolved player profile with its portrait cache.
pub struct Profile {
    id: Uuid,
    username: String,
    skin: Arc<str>,
    portraits: LoadThroughCache<PortraitView, Bytes>,
}

impl Profile {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn skin(&self) -> &str {
        &self.skin
    }

    /// Rendered bytes for `view`, rendered at most once per profile.
    pub async fn portrait(&self, view: PortraitView) -> Result<Option<Bytes>> {
        self.portraits.fetch(view).await
    }

    /// The profile's portrait sub-cache.
    pub fn portraits(&self) -> &LoadThroughCache<PortraitView, Bytes> {
        &self.portraits
    }

    /// Identity fields as a plain record.
    pub fn record(&self) -> ProfileRecord {
        ProfileRecord::new(self.id, self.username.clone(), self.skin.to_string())
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("portraits", &self.portraits.entry_count())
            .finish()
    }
}

/// Builds [`Profile`]s, wiring each one's portrait cache to the shared
/// renderer and worker pool.
#[derive(Clone)]
pub(crate) struct ProfileFactory {
    renderer: Arc<dyn PortraitRenderer>,
    pool: WorkerPool,
}

impl ProfileFactory {
    /// One slot per view.
    const PORTRAIT_SLOTS: u64 = PortraitView::ALL.len() as u64;

    pub(crate) fn new(renderer: Arc<dyn PortraitRenderer>, pool: WorkerPool) -> Self {
        Self { renderer, pool }
    }

    pub(crate) fn build(&self, record: ProfileRecord) -> Result<Arc<Profile>> {
        let skin: Arc<str> = Arc::from(record.skin);
        let portraits = LoadThroughCache::builder(
            "portraits",
            PortraitSource {
                skin: Arc::clone(&skin),
                renderer: Arc::clone(&self.renderer),
            },
        )
        .config(CacheConfig::new().max_entries(Self::PORTRAIT_SLOTS))
        .pool(self.pool.clone())
        .build()?;

        Ok(Arc::new(Profile {
            id: record.uuid,
            username: record.username,
            skin,
            portraits,
        }))
    }
}
