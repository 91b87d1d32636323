//! Celestial bodies acting as reference frames.

use ahash::HashMap;
use game_common::entity::BodyId;
use glam::{DQuat, DVec3};

/// An exponential atmosphere model.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Atmosphere {
    /// Static pressure at sea level in kPa.
    pub sea_level_pressure: f64,
    pub scale_height: f64,
    /// Altitude at which the atmosphere ends.
    pub depth: f64,
}

impl Atmosphere {
    /// Returns the static pressure in kPa at `altitude`.
    pub fn pressure(&self, altitude: f64) -> f64 {
        if altitude >= self.depth {
            return 0.0;
        }

        self.sea_level_pressure * (-altitude.max(0.0) / self.scale_height).exp()
    }
}

/// The state of a body at the current simulation instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pub id: BodyId,
    /// Gravitational parameter.
    pub mu: f64,
    pub radius: f64,
    /// World position of the body center.
    pub position: DVec3,
    /// Current rotation of the body around its axis.
    pub rotation: DQuat,
    pub atmosphere: Option<Atmosphere>,
}

impl Body {
    /// Returns the world position of a point given in body-fixed coordinates. `latitude` and
    /// `longitude` are in degrees, `altitude` is measured from the body radius.
    pub fn surface_position(&self, latitude: f64, longitude: f64, altitude: f64) -> DVec3 {
        let lat = latitude.to_radians();
        let lon = longitude.to_radians();

        let dir = DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin());
        self.position + self.rotation * (dir * (self.radius + altitude))
    }

    /// Returns the static pressure in kPa at `altitude`, `0` for bodies without atmosphere.
    pub fn static_pressure(&self, altitude: f64) -> f64 {
        match &self.atmosphere {
            Some(atmosphere) => atmosphere.pressure(altitude),
            None => 0.0,
        }
    }
}

/// All bodies known to the simulation.
#[derive(Clone, Debug, Default)]
pub struct BodyCatalog {
    bodies: HashMap<BodyId, Body>,
}

impl BodyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a body.
    pub fn insert(&mut self, body: Body) {
        self.bodies.insert(body.id, body);
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    pub fn remove(&mut self, id: BodyId) -> Option<Body> {
        self.bodies.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
