use game_common::metrics::{Counter, Gauge};

#[derive(Clone, Debug)]
pub struct SyncMetrics {
    /// The total number of field updates buffered.
    pub enqueued: Counter,
    /// The total number of field updates applied to the simulation.
    pub applied: Counter,
    /// The total number of due field updates that could not be applied.
    pub dropped: Counter,
    /// The total number of field updates and snapshots rejected on arrival.
    pub rejected: Counter,
    /// The number of field updates currently buffered across all entities.
    pub pending: Gauge,
    /// The number of entities with an update queue.
    pub entities: Gauge,
    /// The total number of snapshots accepted.
    pub snapshots: Counter,
    /// The total number of successful interpolations.
    pub interpolated: Counter,
    _priv: (),
}

impl SyncMetrics {
    pub(crate) const fn new() -> Self {
        Self {
            enqueued: Counter::new(),
            applied: Counter::new(),
            dropped: Counter::new(),
            rejected: Counter::new(),
            pending: Gauge::new(),
            entities: Gauge::new(),
            snapshots: Counter::new(),
            interpolated: Counter::new(),
            _priv: (),
        }
    }
}
