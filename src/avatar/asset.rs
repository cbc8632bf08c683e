//! Named-asset registry.
//!
//! The host game server serves assets to clients by `(pack, name)`. The
//! [`AssetRegistry`] trait is the slice of that API the avatar cache uses;
//! [`MemoryAssetRegistry`] is an in-process implementation for hosts that
//! serve assets from memory, and for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Global, process-wide registry of named assets.
pub trait AssetRegistry: Send + Sync {
    /// Publish `data` under `name` in `pack`, replacing any previous asset.
    fn publish(&self, pack: &str, name: &str, data: Bytes);

    /// Remove the asset, returning whether it existed.
    fn remove(&self, pack: &str, name: &str) -> bool;
}

/// An asset held in memory, with the content hash clients use to detect
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAsset {
    pub name: String,
    pub data: Bytes,
    /// Lower-case hex SHA-256 of `data`.
    pub hash: String,
}

impl MemoryAsset {
    pub fn new(name: impl Into<String>, data: Bytes) -> Self {
        let hash = format!("{:x}", Sha256::digest(&data));
        Self {
            name: name.into(),
            data,
            hash,
        }
    }
}

/// In-memory [`AssetRegistry`].
#[derive(Debug, Default)]
pub struct MemoryAssetRegistry {
    assets: DashMap<(String, String), MemoryAsset>,
    published: AtomicU64,
    removed: AtomicU64,
}

impl MemoryAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The asset published under `(pack, name)`, if any.
    pub fn get(&self, pack: &str, name: &str) -> Option<MemoryAsset> {
        self.assets
            .get(&(pack.to_owned(), name.to_owned()))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, pack: &str, name: &str) -> bool {
        self.assets
            .contains_key(&(pack.to_owned(), name.to_owned()))
    }

    /// Number of assets currently published, across all packs.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Number of assets published in `pack`.
    pub fn pack_len(&self, pack: &str) -> usize {
        self.assets.iter().filter(|e| e.key().0 == pack).count()
    }

    /// Total successful `publish` calls.
    pub fn publish_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total `remove` calls that actually removed an asset.
    pub fn remove_count(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }
}

impl AssetRegistry for MemoryAssetRegistry {
    fn publish(&self, pack: &str, name: &str, data: Bytes) {
        self.assets.insert(
            (pack.to_owned(), name.to_owned()),
            MemoryAsset::new(name, data),
        );
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    fn remove(&self, pack: &str, name: &str) -> bool {
        let removed = self
            .assets
            .remove(&(pack.to_owned(), name.to_owned()))
            .is_some();
        if removed {
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }
}
