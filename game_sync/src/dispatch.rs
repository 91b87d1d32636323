//! Release of buffered field updates once they become due.
//!
//! Updates usually arrive before the synchronized clock reaches their scheduled time. A periodic
//! dispatch pass walks all entities and applies every update whose time has come, in scheduled
//! order. Updates that are not due yet stay buffered for a later pass.

use std::sync::Arc;
use std::time::Duration;

use game_common::time::UniversalTime;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::field::FieldSink;
use crate::gate::Readiness;
use crate::metrics::SyncMetrics;
use crate::pool::UpdatePool;
use crate::queue::ScheduledUpdate;
use crate::registry::QueueRegistry;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Number of entities that had at least one due update.
    pub entities: usize,
    pub applied: usize,
    /// Number of due updates whose target no longer exists.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<QueueRegistry>,
    pool: Arc<UpdatePool>,
    metrics: Arc<SyncMetrics>,
    /// Scratch buffer for the due updates of one entity.
    due: Vec<ScheduledUpdate>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<QueueRegistry>,
        pool: Arc<UpdatePool>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            registry,
            pool,
            metrics,
            due: Vec::new(),
        }
    }

    /// Applies all updates scheduled at or before `now` to `sink`.
    ///
    /// An update that fails to apply is dropped; it never holds back the updates behind it.
    pub fn run_pass<S>(&mut self, now: UniversalTime, sink: &mut S) -> DispatchStats
    where
        S: FieldSink + ?Sized,
    {
        let _span = tracing::debug_span!("dispatch", %now).entered();

        let Self {
            registry,
            pool,
            metrics,
            due,
        } = self;

        let mut stats = DispatchStats::default();
        registry.for_each_entity(|id, queue| {
            // Hold the lock only while taking the updates out so that producers
            // for this entity are not blocked while they are applied.
            {
                let mut queue = queue.lock();
                while let Some(update) = queue.pop_due(now) {
                    due.push(update);
                }
            }

            if due.is_empty() {
                return;
            }
            stats.entities += 1;

            for update in due.drain(..) {
                match sink.apply_field(id, &update.update) {
                    Ok(()) => {
                        stats.applied += 1;
                        metrics.applied.inc();
                    }
                    Err(err) => {
                        tracing::debug!(
                            entity = %id,
                            "dropping update of field {}: {}",
                            update.update.field,
                            err
                        );

                        stats.dropped += 1;
                        metrics.dropped.inc();
                    }
                }

                metrics.pending.dec();
                pool.release(update);
            }
        });

        if stats.applied != 0 || stats.dropped != 0 {
            tracing::trace!(
                "applied {} updates to {} entities ({} dropped)",
                stats.applied,
                stats.entities,
                stats.dropped
            );
        }

        stats
    }
}

/// Handle to a running dispatch loop.
#[derive(Debug)]
pub struct DispatchTask<S> {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<S>,
}

impl<S> DispatchTask<S> {
    /// Stops the loop after the current pass and returns the sink.
    pub async fn shutdown(self) -> Result<S, JoinError> {
        let _ = self.shutdown.send(());
        self.handle.await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a task running a dispatch pass every `period` while `gate` is ready.
///
/// Ticks missed because a pass took too long are skipped. Dropping the returned handle also
/// stops the loop.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime or if `period` is zero.
pub fn spawn_dispatch_loop<C, R, S>(
    mut dispatcher: Dispatcher,
    clock: Arc<C>,
    gate: Arc<R>,
    mut sink: S,
    period: Duration,
) -> DispatchTask<S>
where
    C: Clock + ?Sized + 'static,
    R: Readiness + ?Sized + 'static,
    S: FieldSink + Send + 'static,
{
    let (tx, mut rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = interval.tick() => {
                    if gate.is_ready() {
                        dispatcher.run_pass(clock.now(), &mut sink);
                    }
                }
            }
        }

        tracing::debug!("dispatch loop stopped");
        sink
    });

    DispatchTask {
        shutdown: tx,
        handle,
    }
}
