//! Interpolation between two snapshots of an entity.
//!
//! Every tick the entity is moved to a pose between its `previous` and `target` snapshot. The
//! blend fraction is computed by the caller from the time elapsed since the target was captured.

use game_common::entity::BodyId;
use game_common::time::UniversalTime;
use thiserror::Error;

use crate::body::{Body, BodyCatalog};
use crate::orbit::Orbit;
use crate::snapshot::{Snapshot, SnapshotPair};
use crate::vessel::{place_parts, Pose, Vessel};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum InterpolateError {
    #[error("less than two snapshots available")]
    Incomplete,
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),
    #[error("simulation not ready")]
    NotReady,
}

/// Interpolates the entity between the snapshots of `pair`.
///
/// Returns [`InterpolateError::Incomplete`] without touching the entity if the pair does not
/// hold two snapshots yet.
pub fn interpolate_pair<V>(
    vessel: &mut V,
    pair: &SnapshotPair,
    bodies: &BodyCatalog,
    percentage: f64,
    now: UniversalTime,
) -> Result<(), InterpolateError>
where
    V: Vessel + ?Sized,
{
    let (previous, target) = pair.complete().ok_or(InterpolateError::Incomplete)?;
    interpolate(vessel, previous, target, bodies, percentage, now)
}

/// Moves the entity to the pose `percentage` of the way from `previous` to `target` at `now`.
pub fn interpolate<V>(
    vessel: &mut V,
    previous: &Snapshot,
    target: &Snapshot,
    bodies: &BodyCatalog,
    percentage: f64,
    now: UniversalTime,
) -> Result<(), InterpolateError>
where
    V: Vessel + ?Sized,
{
    let percentage = if percentage.is_nan() {
        1.0
    } else {
        percentage.clamp(0.0, 1.0)
    };

    // Reference frames cannot be blended, switch halfway instead.
    let body_id = if percentage < 0.5 {
        previous.body
    } else {
        target.body
    };
    let body = bodies
        .get(body_id)
        .ok_or(InterpolateError::UnknownBody(body_id))?;

    interpolate_orbit(vessel, previous, target, body, percentage, now);

    // The situation of the entity is derived from these, so they must follow
    // the target even if they are not blended.
    let state = vessel.state_mut();
    state.static_pressure = body.static_pressure(target.lat_lon_alt.altitude);
    state.height_from_terrain = target.height_from_terrain;

    if vessel.is_loaded() {
        interpolate_loaded(vessel, previous, target, body, percentage, now);
    } else {
        // Blending the surface position makes landed entities jitter when
        // seen from orbit.
        let state = vessel.state_mut();
        state.lat_lon_alt = target.lat_lon_alt;

        if state.landed_or_splashed() {
            let lla = state.lat_lon_alt;
            let position = body.surface_position(lla.latitude, lla.longitude, lla.altitude);
            vessel.set_position(position);
        }
    }

    Ok(())
}

/// Projects both snapshots to `now` along their own trajectories and blends the resulting
/// state vectors.
fn interpolate_orbit<V>(
    vessel: &mut V,
    previous: &Snapshot,
    target: &Snapshot,
    body: &Body,
    percentage: f64,
    now: UniversalTime,
) where
    V: Vessel + ?Sized,
{
    let (previous_pos, previous_vel) = previous.orbit.state_at(now);
    let (target_pos, target_vel) = target.orbit.state_at(now);

    let position = previous_pos.lerp(target_pos, percentage);
    let velocity = previous_vel.lerp(target_vel, percentage);

    let orbit = Orbit::from_state_vectors(body.id, body.mu, position, velocity, now);
    vessel.state_mut().orbit = orbit;
}

fn interpolate_loaded<V>(
    vessel: &mut V,
    previous: &Snapshot,
    target: &Snapshot,
    body: &Body,
    percentage: f64,
    now: UniversalTime,
) where
    V: Vessel + ?Sized,
{
    let surface_rotation = previous
        .surface_rotation
        .slerp(target.surface_rotation, percentage);

    let state = vessel.state_mut();
    // Packed entities only pick up rotation changes through the surface
    // rotation.
    state.surface_rotation = surface_rotation;

    let source = if percentage < 0.5 { previous } else { target };
    state.landed = source.landed;
    state.splashed = source.splashed;

    state.lat_lon_alt = previous.lat_lon_alt.lerp(target.lat_lon_alt, percentage);

    let rotation = body.rotation * surface_rotation;
    let position = if vessel.situation().is_surface_bound() {
        let lla = vessel.state().lat_lon_alt;
        body.surface_position(lla.latitude, lla.longitude, lla.altitude)
    } else {
        body.position + vessel.state().orbit.relative_position_at(now)
    };

    set_loaded_pose(vessel, Pose::new(position, rotation));
}

/// Moves a loaded entity with all of its parts.
fn set_loaded_pose<V>(vessel: &mut V, pose: Pose)
where
    V: Vessel + ?Sized,
{
    let moved = place_parts(vessel, pose);

    // Velocities must be corrected after the position was written, otherwise
    // the relative velocities of entities about to couple are wrong.
    if !vessel.is_packed() && vessel.resume_velocity() {
        for index in moved {
            vessel.resume_part_velocity(index);
        }
    }
}
