//! Worker pool for outbound source computations.
//!
//! Every cache miss is computed on a [`WorkerPool`] rather than on the
//! caller's task, so a miss issued from a world thread never ties that
//! thread up with network I/O, and a computation keeps running when the
//! caller that started it goes away.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::{PortrayError, Result};

/// Default number of worker threads for a dedicated pool.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Handle onto the runtime that executes source computations.
///
/// Either owns a dedicated multi-thread runtime ([`WorkerPool::new`]) or
/// borrows an existing one ([`WorkerPool::current`],
/// [`WorkerPool::from_handle`]). Cloning is cheap; a dedicated runtime
/// shuts down when the last clone is dropped.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    owned: Option<Arc<OwnedRuntime>>,
}

/// Dedicated runtime, shut down without blocking so the pool can be
/// dropped from inside async code.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

impl WorkerPool {
    /// Start a dedicated pool with `worker_threads` I/O threads.
    pub fn new(worker_threads: usize) -> Result<Self> {
        if worker_threads == 0 {
            return Err(PortrayError::Configuration(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("portray-io")
            .enable_all()
            .build()
            .map_err(|e| {
                PortrayError::Configuration(format!("failed to start worker pool: {e}"))
            })?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Use the runtime the caller is currently running on.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            PortrayError::Configuration(format!("no tokio runtime for worker pool: {e}"))
        })?;
        Ok(Self::from_handle(handle))
    }

    /// Use an existing runtime owned by the host.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    /// Whether this pool owns its runtime.
    pub fn is_dedicated(&self) -> bool {
        self.owned.is_some()
    }

    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("dedicated", &self.is_dedicated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_is_a_configuration_error() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(PortrayError::Configuration(_))
        ));
    }

    #[test]
    fn current_outside_runtime_is_a_configuration_error() {
        assert!(matches!(
            WorkerPool::current(),
            Err(PortrayError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn dedicated_pool_runs_on_its_own_threads() {
        let pool = WorkerPool::new(1).unwrap();
        assert!(pool.is_dedicated());

        let name = pool
            .spawn(async { std::thread::current().name().map(str::to_owned) })
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("portray-io"));

        // Dropping inside async code must not panic.
        drop(pool);
    }

    #[tokio::test]
    async fn current_pool_borrows_the_runtime() {
        let pool = WorkerPool::current().unwrap();
        assert!(!pool.is_dedicated());
        assert_eq!(pool.spawn(async { 7 }).await.unwrap(), 7);
    }
}
