//! Keplerian trajectories around a single body.
//!
//! An [`Orbit`] is stored as the state vectors relative to its reference body at an epoch.
//! Propagation to other times uses the universal variable formulation, which handles elliptic,
//! parabolic and hyperbolic trajectories alike and has no singularities for circular or
//! equatorial orbits.

use std::f64::consts::TAU;

use game_common::entity::BodyId;
use game_common::time::UniversalTime;
use glam::DVec3;

const MAX_ITERATIONS: usize = 64;
const TOLERANCE: f64 = 1e-12;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Orbit {
    pub body: BodyId,
    /// Gravitational parameter of the reference body.
    pub mu: f64,
    /// Position relative to the reference body at `epoch`.
    pub position: DVec3,
    /// Velocity relative to the reference body at `epoch`.
    pub velocity: DVec3,
    pub epoch: UniversalTime,
}

impl Orbit {
    /// Creates an orbit passing through `position` with `velocity` at `epoch`.
    pub const fn from_state_vectors(
        body: BodyId,
        mu: f64,
        position: DVec3,
        velocity: DVec3,
        epoch: UniversalTime,
    ) -> Self {
        Self {
            body,
            mu,
            position,
            velocity,
            epoch,
        }
    }

    /// Returns `true` if the orbit can be propagated.
    pub fn is_valid(&self) -> bool {
        self.mu.is_finite()
            && self.mu > 0.0
            && self.position.is_finite()
            && self.velocity.is_finite()
            && self.position.length_squared() > 0.0
            && self.epoch.is_finite()
    }

    /// Returns the position relative to the reference body at `ut`.
    #[inline]
    pub fn relative_position_at(&self, ut: UniversalTime) -> DVec3 {
        self.state_at(ut).0
    }

    /// Returns the velocity relative to the reference body at `ut`.
    #[inline]
    pub fn velocity_at(&self, ut: UniversalTime) -> DVec3 {
        self.state_at(ut).1
    }

    /// Returns the position and velocity relative to the reference body at `ut`.
    pub fn state_at(&self, ut: UniversalTime) -> (DVec3, DVec3) {
        let mut dt = ut - self.epoch;
        if dt == 0.0 || !self.is_valid() {
            return (self.position, self.velocity);
        }

        // Bound the Newton iteration by propagating at most one revolution.
        if let Some(period) = self.period() {
            dt %= period;
        }

        let r0 = self.position.length();
        let vr0 = self.position.dot(self.velocity) / r0;
        let alpha = self.inverse_semi_major_axis();
        let sqrt_mu = self.mu.sqrt();

        let chi = solve_universal_anomaly(dt, r0, vr0, alpha, self.mu);

        let z = alpha * chi * chi;
        let c = stumpff_c(z);
        let s = stumpff_s(z);

        let f = 1.0 - chi * chi / r0 * c;
        let g = dt - chi * chi * chi / sqrt_mu * s;

        let position = f * self.position + g * self.velocity;
        let r = position.length();

        let f_dot = sqrt_mu / (r * r0) * (alpha * chi * chi * chi * s - chi);
        let g_dot = 1.0 - chi * chi / r * c;

        let velocity = f_dot * self.position + g_dot * self.velocity;
        (position, velocity)
    }

    /// Returns `1 / a`. Positive for elliptic, zero for parabolic and negative for hyperbolic
    /// orbits.
    pub fn inverse_semi_major_axis(&self) -> f64 {
        2.0 / self.position.length() - self.velocity.length_squared() / self.mu
    }

    /// Returns the semi-major axis, or `None` for a parabolic trajectory.
    pub fn semi_major_axis(&self) -> Option<f64> {
        let alpha = self.inverse_semi_major_axis();
        (alpha != 0.0).then(|| 1.0 / alpha)
    }

    pub fn eccentricity(&self) -> f64 {
        let r = self.position;
        let v = self.velocity;
        let e = ((v.length_squared() - self.mu / r.length()) * r - r.dot(v) * v) / self.mu;
        e.length()
    }

    /// Returns the orbital period, or `None` if the orbit is not closed.
    pub fn period(&self) -> Option<f64> {
        let alpha = self.inverse_semi_major_axis();
        if alpha <= 0.0 || !alpha.is_finite() {
            return None;
        }

        let a = 1.0 / alpha;
        Some(TAU * (a * a * a / self.mu).sqrt())
    }
}

/// Solves the universal Kepler equation for the universal anomaly using Newton's method.
fn solve_universal_anomaly(dt: f64, r0: f64, vr0: f64, alpha: f64, mu: f64) -> f64 {
    let sqrt_mu = mu.sqrt();

    let mut chi = if alpha > 0.0 {
        sqrt_mu * alpha.abs() * dt
    } else {
        // A loose guess is good enough; Newton converges from the
        // right side for open trajectories.
        sqrt_mu * dt / r0
    };

    for _ in 0..MAX_ITERATIONS {
        let chi2 = chi * chi;
        let z = alpha * chi2;
        let c = stumpff_c(z);
        let s = stumpff_s(z);

        let f = r0 * vr0 / sqrt_mu * chi2 * c + (1.0 - alpha * r0) * chi2 * chi * s + r0 * chi
            - sqrt_mu * dt;
        let df = r0 * vr0 / sqrt_mu * chi * (1.0 - z * s) + (1.0 - alpha * r0) * chi2 * c + r0;

        let ratio = f / df;
        if !ratio.is_finite() {
            break;
        }

        chi -= ratio;
        if ratio.abs() <= TOLERANCE * chi.abs().max(1.0) {
            break;
        }
    }

    chi
}

fn stumpff_c(z: f64) -> f64 {
    if z.abs() < 1e-6 {
        1.0 / 2.0 - z / 24.0 + z * z / 720.0
    } else if z > 0.0 {
        (1.0 - z.sqrt().cos()) / z
    } else {
        ((-z).sqrt().cosh() - 1.0) / -z
    }
}

fn stumpff_s(z: f64) -> f64 {
    if z.abs() < 1e-6 {
        1.0 / 6.0 - z / 120.0 + z * z / 5040.0
    } else if z > 0.0 {
        let sz = z.sqrt();
        (sz - sz.sin()) / (sz * sz * sz)
    } else {
        let sz = (-z).sqrt();
        (sz.sinh() - sz) / (sz * sz * sz)
    }
}
