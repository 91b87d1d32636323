//! The local representation of a remote entity.

use game_common::entity::{EntityId, PartId};
use glam::{DQuat, DVec3};

use crate::orbit::Orbit;

/// Where an entity currently is relative to its reference body.
///
/// The variants are ordered: everything up to and including [`Situation::Prelaunch`] is bound to
/// the surface of the body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Situation {
    Landed,
    Splashed,
    Prelaunch,
    Flying,
    SubOrbital,
    Orbiting,
    Escaping,
    Docked,
}

impl Situation {
    /// Returns `true` if the position is derived from the body surface instead of the orbit.
    #[inline]
    pub fn is_surface_bound(self) -> bool {
        self <= Self::Prelaunch
    }
}

/// A position in body-fixed coordinates. Angles are in degrees.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LatLonAlt {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl LatLonAlt {
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    pub fn lerp(self, rhs: Self, s: f64) -> Self {
        Self {
            latitude: lerp(self.latitude, rhs.latitude, s),
            longitude: lerp(self.longitude, rhs.longitude, s),
            altitude: lerp(self.altitude, rhs.altitude, s),
        }
    }

    pub fn is_finite(self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.altitude.is_finite()
    }
}

#[inline]
pub(crate) fn lerp(a: f64, b: f64, s: f64) -> f64 {
    a + (b - a) * s
}

/// A rigid transform in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pose {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub const fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }
}

/// A part of an entity that can be positioned independently.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub id: PartId,
    /// Offset of the part from the entity origin in the entity frame.
    pub original_position: DVec3,
    /// Rotation of the part relative to the entity frame.
    pub original_rotation: DQuat,
    /// Current world pose.
    pub pose: Pose,
    /// Whether the part has a rigid body of its own in the physics simulation.
    pub physically_significant: bool,
}

impl Part {
    pub fn new(id: PartId, original_position: DVec3, original_rotation: DQuat) -> Self {
        Self {
            id,
            original_position,
            original_rotation,
            pose: Pose::IDENTITY,
            physically_significant: true,
        }
    }
}

/// Plain state of an entity written by the interpolator.
#[derive(Clone, Debug, PartialEq)]
pub struct VesselState {
    pub orbit: Orbit,
    pub lat_lon_alt: LatLonAlt,
    /// Static pressure in kPa at the current altitude.
    pub static_pressure: f64,
    pub height_from_terrain: f64,
    /// Rotation relative to the body surface.
    pub surface_rotation: DQuat,
    pub landed: bool,
    pub splashed: bool,
}

impl VesselState {
    pub fn new(orbit: Orbit) -> Self {
        Self {
            orbit,
            lat_lon_alt: LatLonAlt::default(),
            static_pressure: 0.0,
            height_from_terrain: 0.0,
            surface_rotation: DQuat::IDENTITY,
            landed: false,
            splashed: false,
        }
    }

    #[inline]
    pub fn landed_or_splashed(&self) -> bool {
        self.landed || self.splashed
    }
}

/// The simulation representation of a remote entity.
pub trait Vessel {
    /// Returns `true` if the entity is fully simulated.
    fn is_loaded(&self) -> bool;

    /// Returns `true` if the entity runs in reduced physics mode.
    fn is_packed(&self) -> bool;

    fn situation(&self) -> Situation;

    fn state(&self) -> &VesselState;

    fn state_mut(&mut self) -> &mut VesselState;

    /// Moves the entity origin without touching its parts. Used for entities that are not
    /// loaded.
    fn set_position(&mut self, position: DVec3);

    /// Sets the world pose of the entity origin after its parts have been placed.
    fn set_pose(&mut self, pose: Pose);

    fn parts_mut(&mut self) -> &mut [Part];

    /// Brings the velocity of the root rigid body in line with its orbit. Returns `true` if the
    /// velocity changed.
    fn resume_velocity(&mut self) -> bool;

    /// Brings the velocity of the part at `index` in line with its orbit.
    fn resume_part_velocity(&mut self, index: usize);
}

/// Lookup of the local representations of remote entities.
pub trait Vessels {
    type Vessel: Vessel + ?Sized;

    /// Returns the entity, or `None` if it no longer exists in the simulation.
    fn vessel_mut(&mut self, id: EntityId) -> Option<&mut Self::Vessel>;
}

/// Places a single part of an entity whose origin is at `pose`.
#[inline]
pub fn place_part(part: &mut Part, pose: Pose) {
    part.pose.rotation = pose.rotation * part.original_rotation;
    part.pose.position = pose.position + pose.rotation * part.original_position;
}

/// Moves all parts of the entity and then its origin to `pose` in a single pass.
///
/// Returns the indices of the parts that were moved. Unless the entity is packed, parts without
/// physical significance are left untouched.
pub fn place_parts<V>(vessel: &mut V, pose: Pose) -> Vec<usize>
where
    V: Vessel + ?Sized,
{
    let packed = vessel.is_packed();

    let mut moved = Vec::new();
    for (index, part) in vessel.parts_mut().iter_mut().enumerate() {
        if !packed && !part.physically_significant {
            continue;
        }

        place_part(part, pose);
        moved.push(index);
    }

    vessel.set_pose(pose);
    moved
}
