//! # Actor registry - handles of running actor drive loops.
//!
//! ## Rules
//! - Registry owns the actor handles (JoinHandle + CancellationToken)
//! - Insertion happens under the lock that also spawns the drive loop, so a loop
//!   that ends immediately still finds its own entry to remove
//! - Removal is performed by the drive loop itself on exit (no polling)
//! - Shutdown drains every handle at once

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identifier assigned to an actor on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub(crate) u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Handle to a running actor drive loop.
pub(crate) struct Handle {
    pub(crate) role: Arc<str>,
    pub(crate) cancel: CancellationToken,
    pub(crate) join: JoinHandle<()>,
}

/// Registry of running actors.
#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    closed: bool,
    actors: HashMap<ActorId, Handle>,
}

impl Registry {
    /// Allocates an id and registers the handle produced by `spawn`.
    ///
    /// Returns `None` without calling `spawn` once the registry is closed.
    pub(crate) fn register(
        &self,
        spawn: impl FnOnce(ActorId) -> Handle,
    ) -> Option<ActorId> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        let id = ActorId(inner.next_id);
        inner.next_id += 1;
        let handle = spawn(id);
        inner.actors.insert(id, handle);
        Some(id)
    }

    /// Forgets a finished actor.
    pub(crate) fn remove(&self, id: ActorId) {
        self.inner.lock().actors.remove(&id);
    }

    /// Sorted role names of running actors.
    pub(crate) fn list(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut names: Vec<String> = inner.actors.values().map(|h| h.role.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Number of running actors.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().actors.len()
    }

    /// Refuses further registrations and takes every handle.
    pub(crate) fn close_and_drain(&self) -> Vec<Handle> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.actors.drain().map(|(_, h)| h).collect()
    }

    /// True once [`close_and_drain`](Self::close_and_drain) was called.
    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
