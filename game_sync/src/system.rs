//! Entry point tying the update queues and the snapshot interpolation together.

use std::sync::Arc;

use game_common::entity::EntityId;
use game_common::time::UniversalTime;
use parking_lot::Mutex;

use crate::body::BodyCatalog;
use crate::config::Config;
use crate::clock::Clock;
use crate::dispatch::{spawn_dispatch_loop, DispatchStats, DispatchTask, Dispatcher};
use crate::field::{FieldSink, FieldUpdate, UpdateError};
use crate::gate::{Readiness, SceneGate};
use crate::interpolate::{interpolate_pair, InterpolateError};
use crate::metrics::SyncMetrics;
use crate::pool::UpdatePool;
use crate::queue::ScheduledUpdate;
use crate::registry::QueueRegistry;
use crate::snapshot::{blend_fraction, Snapshot, SnapshotError, SnapshotMessage, SnapshotStore};
use crate::vessel::{Vessel, Vessels};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InterpolateStats {
    pub interpolated: usize,
    /// Entities with less than two snapshots.
    pub incomplete: usize,
    /// Entities that no longer exist in the simulation.
    pub missing: usize,
    pub failed: usize,
}

/// Client-side reconciliation of remote entity state.
///
/// Field updates are buffered per entity until the synchronized clock reaches their scheduled
/// time, snapshots are kept in pairs and blended every tick.
#[derive(Debug)]
pub struct SyncSystem {
    config: Config,
    registry: Arc<QueueRegistry>,
    pool: Arc<UpdatePool>,
    snapshots: SnapshotStore,
    metrics: Arc<SyncMetrics>,
    dispatcher: Mutex<Dispatcher>,
}

impl SyncSystem {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(QueueRegistry::new());
        let pool = Arc::new(UpdatePool::with_recycling(config.pool.enabled));
        let metrics = Arc::new(SyncMetrics::new());

        let dispatcher = Dispatcher::new(registry.clone(), pool.clone(), metrics.clone());

        Self {
            config,
            registry,
            pool,
            snapshots: SnapshotStore::new(),
            metrics,
            dispatcher: Mutex::new(dispatcher),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    pub fn pool(&self) -> &UpdatePool {
        &self.pool
    }

    /// Creates a new [`Dispatcher`] working on the queues of this system, e.g. to run it in a
    /// background task.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.registry.clone(),
            self.pool.clone(),
            self.metrics.clone(),
        )
    }

    /// Creates a new [`SceneGate`] with the configured settle delay.
    pub fn scene_gate(&self) -> SceneGate {
        SceneGate::from_config(&self.config.dispatch)
    }

    /// Spawns a background task dispatching due updates to `sink` at the configured interval
    /// while `gate` is ready.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn_dispatch_loop<C, R, S>(
        &self,
        clock: Arc<C>,
        gate: Arc<R>,
        sink: S,
    ) -> DispatchTask<S>
    where
        C: Clock + ?Sized + 'static,
        R: Readiness + ?Sized + 'static,
        S: FieldSink + Send + 'static,
    {
        spawn_dispatch_loop(
            self.dispatcher(),
            clock,
            gate,
            sink,
            self.config.dispatch.interval(),
        )
    }

    /// Buffers a field update of `entity` until `time`.
    pub fn on_field_update(
        &self,
        entity: EntityId,
        time: UniversalTime,
        update: &FieldUpdate,
    ) -> Result<(), UpdateError> {
        let res = if time.is_finite() {
            update.validate()
        } else {
            Err(UpdateError::InvalidTime)
        };

        if let Err(err) = res {
            tracing::warn!(entity = %entity, "rejecting field update: {}", err);
            self.metrics.rejected.inc();
            return Err(err);
        }

        let mut record = self.pool.acquire();
        record.entity = entity;
        record.time = time;
        record.update.clone_from(update);

        let queue = self.registry.get_or_create(entity);
        let res = queue.lock().enqueue(record);
        match res {
            Ok(()) => {
                self.metrics.enqueued.inc();
                self.metrics.pending.inc();
            }
            // The entity was removed while we were inserting.
            Err(record) => self.pool.release(record),
        }

        self.metrics.entities.set(self.registry.len() as u64);
        Ok(())
    }

    /// Stores a new snapshot of `entity`, demoting the previous target.
    pub fn on_snapshot(
        &self,
        entity: EntityId,
        msg: &SnapshotMessage,
        bodies: &BodyCatalog,
    ) -> Result<(), SnapshotError> {
        let res = Snapshot::from_message(msg, bodies)
            .and_then(|snapshot| self.snapshots.push(entity, snapshot));

        match res {
            Ok(()) => self.metrics.snapshots.inc(),
            Err(SnapshotError::Stale { time, target }) => {
                tracing::trace!(entity = %entity, "ignoring snapshot at {} before {}", time, target);
                self.metrics.rejected.inc();
            }
            Err(err) => {
                tracing::warn!(entity = %entity, "rejecting snapshot: {}", err);
                self.metrics.rejected.inc();
            }
        }

        res
    }

    /// Stops tracking the entity, discarding all of its pending updates and snapshots.
    pub fn remove_entity(&self, entity: EntityId) {
        let pending = self.registry.remove(entity);
        self.discard(pending);
        self.snapshots.remove(entity);

        self.metrics.entities.set(self.registry.len() as u64);
    }

    /// Drops all state, as when the system is switched off.
    pub fn disable(&self) {
        let pending = self.registry.clear();
        self.discard(pending);
        self.snapshots.clear();

        self.metrics.entities.set(0);
        tracing::debug!("sync system disabled");
    }

    fn discard(&self, pending: Vec<ScheduledUpdate>) {
        self.metrics.pending.sub(pending.len() as u64);
        for update in pending {
            self.pool.release(update);
        }
    }

    /// Returns `true` if the entity has an update queue.
    pub fn is_tracked(&self, entity: EntityId) -> bool {
        self.registry.contains(entity)
    }

    /// Returns the number of updates still buffered for the entity.
    pub fn pending(&self, entity: EntityId) -> usize {
        self.registry
            .get(entity)
            .map(|queue| queue.lock().len())
            .unwrap_or(0)
    }

    /// Runs a single dispatch pass, applying all updates due at `now`.
    pub fn dispatch<S>(&self, now: UniversalTime, sink: &mut S) -> DispatchStats
    where
        S: FieldSink + ?Sized,
    {
        self.dispatcher.lock().run_pass(now, sink)
    }

    /// Interpolates a single entity at the blend fraction `percentage`.
    ///
    /// Returns [`InterpolateError::NotReady`] without touching the entity while `gate` is
    /// closed.
    pub fn interpolate<V, R>(
        &self,
        gate: &R,
        entity: EntityId,
        vessel: &mut V,
        bodies: &BodyCatalog,
        percentage: f64,
        now: UniversalTime,
    ) -> Result<(), InterpolateError>
    where
        V: Vessel + ?Sized,
        R: Readiness + ?Sized,
    {
        if !gate.is_ready() {
            return Err(InterpolateError::NotReady);
        }

        let pair = self
            .snapshots
            .get(entity)
            .ok_or(InterpolateError::Incomplete)?;

        interpolate_pair(vessel, &pair, bodies, percentage, now)?;
        self.metrics.interpolated.inc();
        Ok(())
    }

    /// Interpolates every entity with snapshots at `now`.
    ///
    /// The blend fraction of each entity is derived from the age of its target snapshot and the
    /// configured update interval. Entities that cannot be interpolated are skipped. Nothing is
    /// touched while `gate` is closed.
    pub fn interpolate_all<W, R>(
        &self,
        gate: &R,
        world: &mut W,
        bodies: &BodyCatalog,
        now: UniversalTime,
    ) -> InterpolateStats
    where
        W: Vessels + ?Sized,
        R: Readiness + ?Sized,
    {
        if !gate.is_ready() {
            return InterpolateStats::default();
        }

        let _span = tracing::trace_span!("interpolate", %now).entered();

        let interval = self.config.interpolation.update_interval();

        let mut stats = InterpolateStats::default();
        for entity in self.snapshots.entities() {
            let Some(pair) = self.snapshots.get(entity) else {
                continue;
            };

            let Some((_, target)) = pair.complete() else {
                stats.incomplete += 1;
                continue;
            };

            let Some(vessel) = world.vessel_mut(entity) else {
                stats.missing += 1;
                continue;
            };

            let percentage = blend_fraction(target.time, now, interval);
            match interpolate_pair(vessel, &pair, bodies, percentage, now) {
                Ok(()) => {
                    stats.interpolated += 1;
                    self.metrics.interpolated.inc();
                }
                Err(err) => {
                    tracing::debug!(entity = %entity, "failed to interpolate: {}", err);
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}

impl Default for SyncSystem {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
