//! Snapshots of the continuous state of remote entities.
//!
//! For every interpolated entity the two newest snapshots are kept: the `target` the entity is
//! moving towards and the `previous` one it is moving away from. A new snapshot always replaces
//! the target and demotes the old target; snapshots are shared immutably and swapped as a whole,
//! never modified in place.

use std::sync::Arc;

use ahash::HashMap;
use game_common::entity::{BodyId, EntityId};
use game_common::time::UniversalTime;
use glam::{DQuat, DVec3};
use parking_lot::RwLock;
use thiserror::Error;

use crate::body::BodyCatalog;
use crate::orbit::Orbit;
use crate::vessel::LatLonAlt;

/// A decoded snapshot as received from the network.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotMessage {
    pub body: BodyId,
    /// Position relative to `body` at `time`.
    pub position: DVec3,
    /// Velocity relative to `body` at `time`.
    pub velocity: DVec3,
    /// Orientation relative to the body surface. The world orientation follows from the current
    /// rotation of `body`.
    pub surface_rotation: DQuat,
    pub lat_lon_alt: LatLonAlt,
    pub height_from_terrain: f64,
    pub landed: bool,
    pub splashed: bool,
    pub time: UniversalTime,
}

/// The complete continuous state of an entity at an instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub body: BodyId,
    pub orbit: Orbit,
    /// Orientation relative to the body surface.
    pub surface_rotation: DQuat,
    pub lat_lon_alt: LatLonAlt,
    pub height_from_terrain: f64,
    pub landed: bool,
    pub splashed: bool,
    pub time: UniversalTime,
}

impl Snapshot {
    /// Builds a snapshot from a network message, resolving the reference body.
    pub fn from_message(
        msg: &SnapshotMessage,
        bodies: &BodyCatalog,
    ) -> Result<Self, SnapshotError> {
        let body = bodies
            .get(msg.body)
            .ok_or(SnapshotError::UnknownBody(msg.body))?;

        let is_finite = msg.position.is_finite()
            && msg.velocity.is_finite()
            && msg.surface_rotation.is_finite()
            && msg.lat_lon_alt.is_finite()
            && msg.height_from_terrain.is_finite()
            && msg.time.is_finite();
        if !is_finite {
            return Err(SnapshotError::NonFinite);
        }

        let surface_rotation =
            normalize_rotation(msg.surface_rotation).ok_or(SnapshotError::InvalidRotation)?;

        let orbit =
            Orbit::from_state_vectors(body.id, body.mu, msg.position, msg.velocity, msg.time);

        Ok(Self {
            body: msg.body,
            orbit,
            surface_rotation,
            lat_lon_alt: msg.lat_lon_alt,
            height_from_terrain: msg.height_from_terrain,
            landed: msg.landed,
            splashed: msg.splashed,
            time: msg.time,
        })
    }
}

/// Returns the unit quaternion of `rotation`, or `None` if it has no direction.
fn normalize_rotation(rotation: DQuat) -> Option<DQuat> {
    let length_squared = rotation.length_squared();
    if length_squared <= f64::EPSILON || !length_squared.is_finite() {
        return None;
    }

    Some(rotation / length_squared.sqrt())
}

#[derive(Copy, Clone, Debug, PartialEq, Error)]
pub enum SnapshotError {
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),
    #[error("snapshot contains non-finite values")]
    NonFinite,
    #[error("snapshot contains a zero-length rotation")]
    InvalidRotation,
    #[error("snapshot at {time} is older than the current target at {target}")]
    Stale {
        time: UniversalTime,
        target: UniversalTime,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PairState {
    Uninitialized,
    HasTarget,
    Complete,
}

/// The two newest snapshots of an entity.
#[derive(Clone, Debug, Default)]
pub struct SnapshotPair {
    previous: Option<Arc<Snapshot>>,
    target: Option<Arc<Snapshot>>,
}

impl SnapshotPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `snapshot` the new target, demoting the current target.
    ///
    /// Snapshots older than the current target are rejected.
    pub fn push(&mut self, snapshot: Arc<Snapshot>) -> Result<(), SnapshotError> {
        if let Some(target) = &self.target {
            if snapshot.time < target.time {
                return Err(SnapshotError::Stale {
                    time: snapshot.time,
                    target: target.time,
                });
            }
        }

        self.previous = self.target.replace(snapshot);
        Ok(())
    }

    pub fn previous(&self) -> Option<&Arc<Snapshot>> {
        self.previous.as_ref()
    }

    pub fn target(&self) -> Option<&Arc<Snapshot>> {
        self.target.as_ref()
    }

    /// Returns both snapshots if interpolation is possible.
    pub fn complete(&self) -> Option<(&Snapshot, &Snapshot)> {
        match (&self.previous, &self.target) {
            (Some(previous), Some(target)) => Some((&**previous, &**target)),
            _ => None,
        }
    }

    pub fn state(&self) -> PairState {
        match (&self.previous, &self.target) {
            (Some(_), Some(_)) => PairState::Complete,
            (None, Some(_)) => PairState::HasTarget,
            _ => PairState::Uninitialized,
        }
    }
}

/// Snapshot pairs of all interpolated entities.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    pairs: RwLock<HashMap<EntityId, SnapshotPair>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: EntityId, snapshot: Snapshot) -> Result<(), SnapshotError> {
        self.pairs
            .write()
            .entry(id)
            .or_default()
            .push(Arc::new(snapshot))
    }

    /// Returns a copy of the pair of the entity. Snapshots are shared, not cloned.
    pub fn get(&self, id: EntityId) -> Option<SnapshotPair> {
        self.pairs.read().get(&id).cloned()
    }

    pub fn remove(&self, id: EntityId) -> Option<SnapshotPair> {
        self.pairs.write().remove(&id)
    }

    pub fn clear(&self) {
        self.pairs.write().clear();
    }

    /// Returns the ids of all entities with at least one snapshot.
    pub fn entities(&self) -> Vec<EntityId> {
        self.pairs.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns how far the interpolation from `previous` to `target` should be at `now`, given that
/// a new target was captured at `target_time` and snapshots arrive every `interval` seconds.
pub fn blend_fraction(target_time: UniversalTime, now: UniversalTime, interval: f64) -> f64 {
    if interval <= 0.0 || !interval.is_finite() {
        return 1.0;
    }

    let s = (now - target_time) / interval;
    if s.is_nan() {
        return 1.0;
    }

    s.clamp(0.0, 1.0)
}
