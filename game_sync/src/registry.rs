//! Mapping of entities to their update queues.
//!
//! The registry is written from the network receive path and read by the dispatch loop at the
//! same time. The map itself is only locked for the duration of a single lookup, insert or
//! removal; a dispatch pass iterates over a copy of the current entries so that the receive path
//! is never blocked for a full pass.

use std::sync::Arc;

use ahash::HashMap;
use game_common::entity::EntityId;
use parking_lot::{Mutex, RwLock};

use crate::queue::{EntityQueue, ScheduledUpdate};

/// A shared handle to the queue of a single entity.
pub type QueueHandle = Arc<Mutex<EntityQueue>>;

#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<EntityId, QueueHandle>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the queue of the entity, creating it if it doesn't exist yet.
    pub fn get_or_create(&self, id: EntityId) -> QueueHandle {
        if let Some(queue) = self.queues.read().get(&id) {
            return queue.clone();
        }

        // Another producer may have inserted the queue between the two locks.
        self.queues.write().entry(id).or_default().clone()
    }

    pub fn get(&self, id: EntityId) -> Option<QueueHandle> {
        self.queues.read().get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.queues.read().contains_key(&id)
    }

    /// Removes the queue of the entity and returns all updates that were still pending.
    ///
    /// The queue is closed, so producers or a dispatch pass still holding its handle will see an
    /// empty queue that rejects new updates.
    pub fn remove(&self, id: EntityId) -> Vec<ScheduledUpdate> {
        let Some(queue) = self.queues.write().remove(&id) else {
            return Vec::new();
        };

        let mut queue = queue.lock();
        queue.close()
    }

    /// Removes all queues, returning all pending updates.
    pub fn clear(&self) -> Vec<ScheduledUpdate> {
        let queues = std::mem::take(&mut *self.queues.write());

        let mut pending = Vec::new();
        for queue in queues.into_values() {
            pending.extend(queue.lock().close());
        }
        pending
    }

    /// Calls `f` for every entity registered at the time of the call.
    ///
    /// Entities inserted or removed while iterating do not affect the iteration; a removed
    /// entity that is visited afterwards has a closed, empty queue.
    pub fn for_each_entity<F>(&self, mut f: F)
    where
        F: FnMut(EntityId, &QueueHandle),
    {
        let entries: Vec<(EntityId, QueueHandle)> = self
            .queues
            .read()
            .iter()
            .map(|(id, queue)| (*id, queue.clone()))
            .collect();

        for (id, queue) in &entries {
            f(*id, queue);
        }
    }

    /// Returns the number of registered entities.
    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
