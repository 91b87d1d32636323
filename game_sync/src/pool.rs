//! Recycling of update records.
//!
//! Field updates arrive at a high rate and each one is buffered until it becomes due. Instead of
//! allocating a new record (and its string buffers) for every update, released records are kept
//! on a lock-free free list and handed out again by [`UpdatePool::acquire`].

use crossbeam_queue::SegQueue;
use game_common::metrics::{Counter, Gauge};

use crate::queue::ScheduledUpdate;

#[derive(Debug)]
pub struct UpdatePool {
    free: SegQueue<ScheduledUpdate>,
    enabled: bool,
    metrics: PoolMetrics,
}

impl UpdatePool {
    pub fn new() -> Self {
        Self::with_recycling(true)
    }

    /// Creates a new `UpdatePool`. If `enabled` is `false` released records are dropped and
    /// every [`acquire`] allocates a new record.
    ///
    /// [`acquire`]: Self::acquire
    pub fn with_recycling(enabled: bool) -> Self {
        Self {
            free: SegQueue::new(),
            enabled,
            metrics: PoolMetrics::new(),
        }
    }

    /// Returns a cleared record, either recycled or newly allocated.
    pub fn acquire(&self) -> ScheduledUpdate {
        match self.free.pop() {
            Some(update) => {
                self.metrics.reused.inc();
                self.metrics.idle.dec();
                update
            }
            None => {
                self.metrics.allocated.inc();
                ScheduledUpdate::default()
            }
        }
    }

    /// Returns a record to the pool.
    ///
    /// The payload of the record is cleared before it is stored so that the pool never keeps
    /// stale values alive.
    pub fn release(&self, mut update: ScheduledUpdate) {
        if !self.enabled {
            return;
        }

        update.clear();
        self.free.push(update);
        self.metrics.idle.inc();
    }

    /// Returns the number of records currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }
}

impl Default for UpdatePool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct PoolMetrics {
    /// The total number of records allocated by the pool.
    pub allocated: Counter,
    /// The total number of records handed out again after a release.
    pub reused: Counter,
    /// The number of records currently held by the pool.
    pub idle: Gauge,
    _priv: (),
}

impl PoolMetrics {
    const fn new() -> Self {
        Self {
            allocated: Counter::new(),
            reused: Counter::new(),
            idle: Gauge::new(),
            _priv: (),
        }
    }
}
