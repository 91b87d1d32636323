//! Time-gated update queue of a single entity.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use game_common::entity::EntityId;
use game_common::time::UniversalTime;

use crate::field::FieldUpdate;

/// A field update that should be applied at `time`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledUpdate {
    pub entity: EntityId,
    pub time: UniversalTime,
    pub update: FieldUpdate,
}

impl ScheduledUpdate {
    pub(crate) fn clear(&mut self) {
        self.entity = EntityId::from_u128(0);
        self.time = UniversalTime::ZERO;
        self.update.clear();
    }
}

impl Default for ScheduledUpdate {
    fn default() -> Self {
        Self {
            entity: EntityId::from_u128(0),
            time: UniversalTime::ZERO,
            update: FieldUpdate::default(),
        }
    }
}

/// Pending updates of one entity, ordered by their scheduled time.
///
/// Updates with the same scheduled time are returned in the order they were pushed. The network
/// does not guarantee ordered delivery, so an update pushed after a later one is still returned
/// first.
#[derive(Clone, Debug, Default)]
pub struct EntityQueue {
    heap: BinaryHeap<Pending>,
    /// Insertion counter used to break ties between equal times.
    next_seq: u64,
    closed: bool,
}

impl EntityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new update into the queue.
    ///
    /// Returns `Err` with the given `update` if the queue was closed because its entity has been
    /// removed.
    pub fn enqueue(&mut self, update: ScheduledUpdate) -> Result<(), ScheduledUpdate> {
        if self.closed {
            return Err(update);
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        self.heap.push(Pending { seq, update });
        Ok(())
    }

    /// Returns the update with the earliest scheduled time without removing it.
    pub fn peek_earliest(&self) -> Option<&ScheduledUpdate> {
        self.heap.peek().map(|pending| &pending.update)
    }

    /// Removes and returns the update with the earliest scheduled time.
    pub fn pop_earliest(&mut self) -> Option<ScheduledUpdate> {
        self.heap.pop().map(|pending| pending.update)
    }

    /// Removes and returns the earliest update if it is due at `now`.
    pub fn pop_due(&mut self, now: UniversalTime) -> Option<ScheduledUpdate> {
        match self.peek_earliest() {
            Some(update) if update.time <= now => self.pop_earliest(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the queue, returning all pending updates. Further calls to [`enqueue`] fail.
    ///
    /// [`enqueue`]: Self::enqueue
    pub fn close(&mut self) -> Vec<ScheduledUpdate> {
        self.closed = true;
        std::mem::take(&mut self.heap)
            .into_iter()
            .map(|pending| pending.update)
            .collect()
    }
}

#[derive(Clone, Debug)]
struct Pending {
    seq: u64,
    update: ScheduledUpdate,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // `BinaryHeap` is a max-heap, so the ordering is reversed: the earliest
    // time and then the lowest sequence number compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .update
            .time
            .total_cmp(&self.update.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
