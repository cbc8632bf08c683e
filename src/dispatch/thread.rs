//! A [`World`] backed by a dedicated OS thread.
//!
//! Hosts that already own a tick loop implement [`World`] over it directly.
//! [`ThreadWorld`] is for everything else: embedding without a game server,
//! the demo binary, and tests.

use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Task, World, WorldId};
use crate::{PortrayError, Result};

/// A world whose tasks run in order on one named thread.
pub struct ThreadWorld {
    id: WorldId,
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadWorld {
    /// Start a world thread with a random id.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Start a world thread for a known world id.
    pub fn with_id(id: WorldId, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();

        let handle = thread::Builder::new()
            .name(format!("world-{name}"))
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
            })
            .map_err(|e| PortrayError::Internal(format!("failed to spawn world thread: {e}")))?;

        debug!(world = %id, %name, "started world thread");
        Ok(Self {
            id,
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the thread tasks run on.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Stop accepting tasks, let queued ones finish, and join the thread.
    ///
    /// Idempotent. Tasks queued afterwards are dropped.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        drop(sender);

        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            // Joining ourselves would deadlock.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(world = %self.id, name = %self.name, "world thread panicked");
            }
            debug!(world = %self.id, name = %self.name, "stopped world thread");
        }
    }
}

impl World for ThreadWorld {
    fn id(&self) -> WorldId {
        self.id
    }

    fn execute(&self, task: Task) {
        let sent = match self.sender.lock() {
            Ok(sender) => sender.as_ref().is_some_and(|tx| tx.send(task).is_ok()),
            Err(_) => false,
        };
        if !sent {
            debug!(world = %self.id, "dropped task for stopped world");
        }
    }
}

impl Drop for ThreadWorld {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorld")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
