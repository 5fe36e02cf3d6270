//! Lifecycle registry: the arena of live actor records keyed by id.

use super::cell::ActorCell;
use super::ActorId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Lifecycle {
    /// Spawned; `started` has not run yet.
    Starting = 0,
    /// Processing messages.
    Running = 1,
    /// Running its `stopped` hook; no longer reachable.
    Stopping = 2,
    /// Gone. Sends fail with `NoSuchActor`.
    Terminated = 3,
}

impl Lifecycle {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Terminated,
        }
    }

    /// Whether the actor still accepts messages.
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Id allocator plus the map of live actors.
pub(crate) struct Registry {
    cells: RwLock<HashMap<ActorId, Arc<ActorCell>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> ActorId {
        ActorId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether `id` was ever handed out.
    pub fn was_allocated(&self, id: ActorId) -> bool {
        id.as_u64() != 0 && id.as_u64() < self.next_id.load(Ordering::Relaxed)
    }

    pub fn insert(&self, cell: Arc<ActorCell>) {
        self.cells.write().insert(cell.id, cell);
    }

    pub fn get(&self, id: ActorId) -> Option<Arc<ActorCell>> {
        self.cells.read().get(&id).cloned()
    }

    pub fn remove(&self, id: ActorId) {
        self.cells.write().remove(&id);
    }

    pub fn ids(&self) -> Vec<ActorId> {
        self.cells.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}
