//! Keyed single-flight registry.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;

use super::WorkerPool;
use crate::{PortrayError, Result};

/// A shared, in-flight computation. Every clone resolves to the same result.
pub(crate) type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// At most one computation per key, shared by every caller that asks while
/// it runs.
///
/// Computations are spawned on a [`WorkerPool`], so they run to completion
/// even if every waiter is dropped. The registry entry is removed by the
/// computation itself once it settles, success or failure, which lets the
/// next miss start a fresh attempt.
pub(crate) struct SingleFlight<K, T> {
    pending: Arc<DashMap<K, Flight<T>>>,
}

impl<K, T> Clone for SingleFlight<K, T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Join the computation running for `key`, or start one with `start`.
    ///
    /// `start` is only called when no computation is in flight for `key`.
    pub(crate) fn join_or_start<F, Fut>(&self, key: K, pool: &WorkerPool, start: F) -> Flight<T>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.pending.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                let work = start(key.clone());
                let pending = Arc::clone(&self.pending);
                // The shard lock held by `entry` keeps this removal from
                // overtaking the insert below.
                let task = pool.spawn(async move {
                    let result = work.await;
                    pending.remove(&key);
                    result
                });
                let flight = async move { task.await.unwrap_or_else(|e| Err(join_error(e))) }
                    .boxed()
                    .shared();
                entry.insert(flight.clone());
                flight
            }
        }
    }

    /// Whether a computation for `key` is currently running.
    pub(crate) fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of computations currently running.
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

fn join_error(err: JoinError) -> PortrayError {
    if err.is_cancelled() {
        PortrayError::Shutdown
    } else {
        PortrayError::Internal(format!("source computation panicked: {err}"))
    }
}
