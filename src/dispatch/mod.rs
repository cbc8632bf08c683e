//! World-affine dispatch.
//!
//! Game state belongs to a world and may only be touched from that world's
//! tick thread. Cache lookups complete on the worker pool, so callers hand
//! their continuation to a [`WorldDispatcher`], which queues it on the
//! world's own executor and returns the result:
//!
//! ```rust,ignore
//! let profile = service.profiles().fetch_by_name("alice").await?;
//! let dispatcher = service.dispatchers().for_world(&world);
//! dispatcher.submit(move || open_avatar_page(profile)).await?;
//! ```
//!
//! # Teardown
//!
//! Removing a world does not drain its queue. Every task submitted through
//! a removed dispatcher fails with [`PortrayError::WorldRemoved`]: those
//! submitted afterwards immediately, those still queued when they come up
//! (they are skipped, not run). Waiters therefore always resume.

pub mod thread;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{PortrayError, Result};

pub use thread::ThreadWorld;

/// Identifier of a game world.
pub type WorldId = Uuid;

/// Unit of work queued on a world thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A game world as seen by the dispatcher: an id and a way to run work on
/// its tick thread.
///
/// Implementations must run tasks one at a time, in the order `execute` was
/// called, on the world's own thread.
pub trait World: Send + Sync {
    fn id(&self) -> WorldId;

    /// Queue `task` for the world's next tick.
    fn execute(&self, task: Task);
}

/// Submits work to one world's thread.
///
/// Obtained from [`WorldDispatcherRegistry::for_world`]; stays valid for the
/// life of that registration.
pub struct WorldDispatcher {
    world: Arc<dyn World>,
    active: Arc<AtomicBool>,
}

impl WorldDispatcher {
    fn new(world: Arc<dyn World>) -> Self {
        Self {
            world,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.world.id()
    }

    /// `false` once the world has been removed from the registry.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Queue `f` on the world thread without waiting for it.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_active() {
            return Err(PortrayError::WorldRemoved(self.world_id()));
        }
        let active = Arc::clone(&self.active);
        self.world.execute(Box::new(move || {
            if active.load(Ordering::Acquire) {
                f();
            }
        }));
        Ok(())
    }

    /// Queue `f` on the world thread and resolve to its return value.
    ///
    /// The task is queued when `submit` is called, not when the returned
    /// future is first polled, so submission order is call order.
    pub fn submit<F, T>(&self, f: F) -> impl Future<Output = Result<T>> + Send + use<F, T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let world_id = self.world_id();
        let (tx, rx) = oneshot::channel();
        let queued = self.execute(move || {
            // The waiter may have given up.
            let _ = tx.send(f());
        });
        async move {
            queued?;
            rx.await.map_err(|_| PortrayError::WorldRemoved(world_id))
        }
    }
}

impl std::fmt::Debug for WorldDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldDispatcher")
            .field("world", &self.world_id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// World id → dispatcher, created on first use and dropped when the world
/// goes away.
#[derive(Default)]
pub struct WorldDispatcherRegistry {
    dispatchers: DashMap<WorldId, Arc<WorldDispatcher>>,
}

impl WorldDispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher for `world`, created if the world has none yet.
    ///
    /// Returns the same instance for as long as the world stays registered.
    pub fn for_world<W>(&self, world: &Arc<W>) -> Arc<WorldDispatcher>
    where
        W: World + 'static,
    {
        let id = world.id();
        let dispatcher = self.dispatchers.entry(id).or_insert_with(|| {
            debug!(world = %id, "created world dispatcher");
            let world: Arc<dyn World> = world.clone();
            Arc::new(WorldDispatcher::new(world))
        });
        Arc::clone(dispatcher.value())
    }

    /// Current dispatcher for `id`, without creating one.
    pub fn get(&self, id: &WorldId) -> Option<Arc<WorldDispatcher>> {
        self.dispatchers
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Forget the world. Work still queued through its dispatcher fails
    /// with [`PortrayError::WorldRemoved`]; a later
    /// [`for_world()`](Self::for_world) creates a fresh dispatcher.
    ///
    /// Returns whether the world was registered.
    pub fn remove_world(&self, id: &WorldId) -> bool {
        match self.dispatchers.remove(id) {
            Some((_, dispatcher)) => {
                dispatcher.deactivate();
                info!(world = %id, "removed world dispatcher");
                true
            }
            None => false,
        }
    }

    /// Remove every world.
    pub fn clear(&self) {
        let ids: Vec<WorldId> = self.dispatchers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.remove_world(&id);
        }
    }

    /// Number of registered worlds.
    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}
