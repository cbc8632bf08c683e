//! Portray - profile and avatar caching for game server plugins
//!
//! This crate resolves player profiles from an identity service, renders
//! their portraits, and publishes the results as named assets, all behind
//! async load-through caches that compute each missing entry exactly once
//! no matter how many callers ask for it. Results that must touch game
//! state are handed back to the owning world's thread through a
//! [`WorldDispatcher`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use portray::{Portray, PortraitView, ThreadWorld, World};
//!
//! #[tokio::main]
//! async fn main() -> portray::Result<()> {
//!     let service = Portray::builder().build()?;
//!     let world = Arc::new(ThreadWorld::spawn("overworld")?);
//!
//!     let Some(profile) = service.profiles().fetch_by_name("Alice").await? else {
//!         return Ok(());
//!     };
//!     let path = service.avatars().fetch(profile.id(), PortraitView::Avatar).await?;
//!
//!     service
//!         .dispatchers()
//!         .for_world(&world)
//!         .submit(move || println!("{} -> {path:?}", profile.username()))
//!         .await?;
//!
//!     service.on_world_removed(world.id());
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Building blocks
//!
//! The generic [`LoadThroughCache`] is usable on its own:
//!
//! ```rust,no_run
//! use portray::cache::{CacheConfig, LoadThroughCache, source_fn};
//!
//! # async fn demo() -> portray::Result<()> {
//! let squares = LoadThroughCache::builder(
//!     "squares",
//!     source_fn(|n: u64| async move { Ok(Some(n * n)) }),
//! )
//! .config(CacheConfig::new().max_entries(100))
//! .build()?;
//!
//! assert_eq!(squares.fetch(12).await?, Some(144));
//! # Ok(())
//! # }
//! ```

pub mod avatar;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod profile;
pub mod service;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use error::{PortrayError, Result};
pub use service::{Portray, PortrayBuilder, PortrayService};

pub use avatar::{AssetRegistry, AvatarCache, MemoryAssetRegistry};
pub use cache::{CacheConfig, CacheSource, LoadThroughCache, WorkerPool};
pub use config::{HttpConfig, PortrayConfig};
pub use dispatch::{ThreadWorld, World, WorldDispatcher, WorldDispatcherRegistry, WorldId};
pub use profile::{
    IdentityService, PortraitRenderer, PortraitView, Profile, ProfileCache, ProfileRecord,
};
pub use version::{PKG_VERSION, version_string};
