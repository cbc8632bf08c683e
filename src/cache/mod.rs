//! Caching subsystem.
//!
//! - [`LoadThroughCache`]: generic async cache that computes its own
//!   misses exactly once per key across all concurrent callers, with
//!   size/TTL/TTI eviction and an eviction hook. Storage and eviction are
//!   moka's; request coalescing is done by an internal single-flight
//!   registry so a computation outlives any individual waiter.
//!
//! - [`WorkerPool`]: where source computations run, kept apart from the
//!   callers' execution contexts.
//!
//! The domain caches ([`ProfileCache`](crate::profile::ProfileCache),
//! [`AvatarCache`](crate::avatar::AvatarCache)) are built from these parts.

pub(crate) mod flight;
pub mod load_through;
pub mod pool;

use std::time::Duration;

pub use load_through::{
    CacheSource, EvictionListener, FnSource, LoadThroughCache, LoadThroughCacheBuilder, source_fn,
};
pub use moka::notification::RemovalCause;
pub use pool::WorkerPool;

use crate::{PortrayError, Result};

/// Capacity and expiry policy for a [`LoadThroughCache`].
///
/// Fixed at construction. Both expiry modes may be combined; an entry
/// leaves the cache as soon as either applies.
///
/// ```rust
/// # use portray::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(1_000)
///     .time_to_idle(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of resident entries. Default: 1,000.
    pub max_entries: u64,
    /// Expire entries this long after they were written. Default: none.
    pub time_to_live: Option<Duration>,
    /// Expire entries this long after they were last read. Default: none.
    pub time_to_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            time_to_live: None,
            time_to_idle: None,
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of resident entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Expire entries a fixed time after they were written.
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Expire entries a fixed time after they were last read.
    pub fn time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }

    /// Check the policy is usable. Invalid parameters are a construction
    /// error, never a runtime condition.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(PortrayError::Configuration(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if self.time_to_live == Some(Duration::ZERO) {
            return Err(PortrayError::Configuration(
                "time_to_live must be non-zero".to_string(),
            ));
        }
        if self.time_to_idle == Some(Duration::ZERO) {
            return Err(PortrayError::Configuration(
                "time_to_idle must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
