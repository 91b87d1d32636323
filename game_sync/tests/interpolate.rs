use ahash::HashMap;
use game_common::entity::{BodyId, EntityId, PartId};
use game_common::time::UniversalTime;
use game_sync::body::{Atmosphere, Body, BodyCatalog};
use game_sync::interpolate::{interpolate, interpolate_pair, InterpolateError};
use game_sync::orbit::Orbit;
use game_sync::snapshot::{Snapshot, SnapshotError, SnapshotMessage, SnapshotPair};
use game_sync::vessel::{LatLonAlt, Part, Pose, Situation, Vessel, VesselState, Vessels};
use game_sync::{InterpolateStats, SyncSystem};
use glam::{DAffine3, DMat3, DQuat, DVec3};

const KERBIN: BodyId = BodyId(1);
const MUN: BodyId = BodyId(2);

const MU: f64 = 3.5316e12;
const RADIUS: f64 = 600_000.0;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Event {
    SetPosition,
    SetPose,
    ResumeVelocity,
    ResumePart(usize),
}

#[derive(Clone, Debug)]
struct TestVessel {
    loaded: bool,
    packed: bool,
    situation: Situation,
    state: VesselState,
    position: Option<DVec3>,
    pose: Option<Pose>,
    parts: Vec<Part>,
    /// Return value of `resume_velocity`.
    velocity_changed: bool,
    events: Vec<Event>,
}

impl TestVessel {
    fn new(loaded: bool) -> Self {
        let orbit = Orbit::from_state_vectors(
            KERBIN,
            MU,
            DVec3::new(RADIUS, 0.0, 0.0),
            DVec3::ZERO,
            UniversalTime::ZERO,
        );

        let root = Part::new(PartId(0), DVec3::ZERO, DQuat::IDENTITY);
        let mut strut = Part::new(
            PartId(1),
            DVec3::new(0.0, 0.0, 1.5),
            DQuat::from_rotation_y(0.3),
        );
        strut.physically_significant = false;
        let engine = Part::new(
            PartId(2),
            DVec3::new(0.0, 0.0, -2.0),
            DQuat::from_rotation_x(1.0),
        );

        Self {
            loaded,
            packed: false,
            situation: Situation::Orbiting,
            state: VesselState::new(orbit),
            position: None,
            pose: None,
            parts: vec![root, strut, engine],
            velocity_changed: true,
            events: Vec::new(),
        }
    }
}

impl Vessel for TestVessel {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn is_packed(&self) -> bool {
        self.packed
    }

    fn situation(&self) -> Situation {
        self.situation
    }

    fn state(&self) -> &VesselState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VesselState {
        &mut self.state
    }

    fn set_position(&mut self, position: DVec3) {
        self.position = Some(position);
        self.events.push(Event::SetPosition);
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = Some(pose);
        self.events.push(Event::SetPose);
    }

    fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    fn resume_velocity(&mut self) -> bool {
        self.events.push(Event::ResumeVelocity);
        self.velocity_changed
    }

    fn resume_part_velocity(&mut self, index: usize) {
        self.events.push(Event::ResumePart(index));
    }
}

fn bodies() -> BodyCatalog {
    let mut bodies = BodyCatalog::new();
    bodies.insert(Body {
        id: KERBIN,
        mu: MU,
        radius: RADIUS,
        position: DVec3::new(1.0e9, 0.0, 0.0),
        rotation: DQuat::from_rotation_z(0.25),
        atmosphere: Some(Atmosphere {
            sea_level_pressure: 101.325,
            scale_height: 5_600.0,
            depth: 70_000.0,
        }),
    });
    bodies.insert(Body {
        id: MUN,
        mu: 6.5138e10,
        radius: 200_000.0,
        position: DVec3::new(1.0e9, 1.2e7, 0.0),
        rotation: DQuat::IDENTITY,
        atmosphere: None,
    });
    bodies
}

fn circular(radius: f64) -> (DVec3, DVec3) {
    let speed = (MU / radius).sqrt();
    (DVec3::new(radius, 0.0, 0.0), DVec3::new(0.0, speed, 0.0))
}

fn message(time: f64) -> SnapshotMessage {
    let (position, velocity) = circular(RADIUS + 100_000.0);
    SnapshotMessage {
        body: KERBIN,
        position,
        velocity,
        surface_rotation: DQuat::IDENTITY,
        lat_lon_alt: LatLonAlt::new(0.0, 0.0, 100_000.0),
        height_from_terrain: 100_000.0,
        landed: false,
        splashed: false,
        time: UniversalTime(time),
    }
}

fn snapshot(msg: &SnapshotMessage) -> Snapshot {
    Snapshot::from_message(msg, &bodies()).unwrap()
}

/// Two snapshots on different trajectories with distinct surface state.
fn diverging() -> (Snapshot, Snapshot) {
    let mut previous = message(10.0);
    previous.surface_rotation = DQuat::from_rotation_x(0.2);
    previous.lat_lon_alt = LatLonAlt::new(1.0, 2.0, 90_000.0);
    previous.height_from_terrain = 90_000.0;

    let mut target = message(10.5);
    let (position, velocity) = circular(RADIUS + 120_000.0);
    target.position = position;
    target.velocity = velocity;
    target.surface_rotation = DQuat::from_rotation_x(0.6);
    target.lat_lon_alt = LatLonAlt::new(3.0, 4.0, 60_000.0);
    target.height_from_terrain = 59_000.0;

    (snapshot(&previous), snapshot(&target))
}

fn assert_vec_eq(a: DVec3, b: DVec3, tolerance: f64) {
    assert!((a - b).length() <= tolerance, "{} != {}", a, b);
}

/// Asserts that `part` sits where `original` ends up when its vessel is moved to `pose`.
fn assert_placed(part: &Part, original: &Part, pose: Pose) {
    let transform = DAffine3::from_rotation_translation(pose.rotation, pose.position);
    assert_vec_eq(
        part.pose.position,
        transform.transform_point3(original.original_position),
        1e-6,
    );

    let expected = transform.matrix3 * DMat3::from_quat(original.original_rotation);
    assert!(DMat3::from_quat(part.pose.rotation).abs_diff_eq(expected, 1e-9));
}

/// Accepts everything.
fn ready() -> bool {
    true
}

#[test]
fn percentage_zero_reproduces_previous() {
    let (previous, target) = diverging();
    let bodies = bodies();
    let now = UniversalTime(10.6);

    let mut vessel = TestVessel::new(true);
    interpolate(&mut vessel, &previous, &target, &bodies, 0.0, now).unwrap();

    let (position, velocity) = previous.orbit.state_at(now);
    assert_vec_eq(vessel.state.orbit.position, position, 1e-6);
    assert_vec_eq(vessel.state.orbit.velocity, velocity, 1e-9);
    assert_eq!(vessel.state.orbit.epoch, now);
    assert_eq!(vessel.state.lat_lon_alt, previous.lat_lon_alt);
    assert!(vessel
        .state
        .surface_rotation
        .abs_diff_eq(previous.surface_rotation, 1e-9));

    let body = bodies.get(KERBIN).unwrap();
    let pose = vessel.pose.unwrap();
    assert_vec_eq(pose.position, body.position + position, 1e-6);
    assert!(pose
        .rotation
        .abs_diff_eq(body.rotation * previous.surface_rotation, 1e-9));
}

#[test]
fn percentage_one_reproduces_target() {
    let (previous, target) = diverging();
    let bodies = bodies();
    let now = UniversalTime(10.6);

    let mut vessel = TestVessel::new(true);
    interpolate(&mut vessel, &previous, &target, &bodies, 1.0, now).unwrap();

    let (position, velocity) = target.orbit.state_at(now);
    assert_vec_eq(vessel.state.orbit.position, position, 1e-6);
    assert_vec_eq(vessel.state.orbit.velocity, velocity, 1e-9);
    assert!((vessel.state.lat_lon_alt.altitude - target.lat_lon_alt.altitude).abs() < 1e-9);
    assert!((vessel.state.lat_lon_alt.latitude - target.lat_lon_alt.latitude).abs() < 1e-12);
    assert!(vessel
        .state
        .surface_rotation
        .abs_diff_eq(target.surface_rotation, 1e-9));

    assert_eq!(vessel.state.height_from_terrain, target.height_from_terrain);
    let body = bodies.get(KERBIN).unwrap();
    assert_eq!(
        vessel.state.static_pressure,
        body.static_pressure(target.lat_lon_alt.altitude)
    );
    assert!(vessel.state.static_pressure > 0.0);
}

#[test]
fn percentage_out_of_range_clamped() {
    let (previous, target) = diverging();
    let bodies = bodies();
    let now = UniversalTime(10.6);

    let mut clamped = TestVessel::new(true);
    interpolate(&mut clamped, &previous, &target, &bodies, 1.0, now).unwrap();

    for percentage in [1.5, f64::INFINITY, f64::NAN] {
        let mut vessel = TestVessel::new(true);
        interpolate(&mut vessel, &previous, &target, &bodies, percentage, now).unwrap();
        assert_eq!(vessel.state, clamped.state);
        assert_eq!(vessel.pose, clamped.pose);
    }

    let mut lower = TestVessel::new(true);
    interpolate(&mut lower, &previous, &target, &bodies, 0.0, now).unwrap();
    let mut vessel = TestVessel::new(true);
    interpolate(&mut vessel, &previous, &target, &bodies, -3.0, now).unwrap();
    assert_eq!(vessel.state, lower.state);
}

#[test]
fn interpolation_is_idempotent() {
    let (previous, target) = diverging();
    let bodies = bodies();
    let now = UniversalTime(10.7);

    let mut vessel = TestVessel::new(true);
    interpolate(&mut vessel, &previous, &target, &bodies, 0.3, now).unwrap();
    let state = vessel.state.clone();
    let pose = vessel.pose;
    let parts = vessel.parts.clone();

    interpolate(&mut vessel, &previous, &target, &bodies, 0.3, now).unwrap();
    assert_eq!(vessel.state, state);
    assert_eq!(vessel.pose, pose);
    assert_eq!(vessel.parts, parts);
}

#[test]
fn body_switches_halfway() {
    let mut previous = message(10.0);
    previous.landed = true;
    let mut target = message(10.5);
    target.splashed = true;
    target.body = MUN;
    target.position = DVec3::new(250_000.0, 0.0, 0.0);
    target.velocity = DVec3::new(0.0, 500.0, 0.0);

    let bodies = bodies();
    let previous = Snapshot::from_message(&previous, &bodies).unwrap();
    let target = Snapshot::from_message(&target, &bodies).unwrap();
    let now = UniversalTime(10.5);

    let mut vessel = TestVessel::new(true);
    interpolate(&mut vessel, &previous, &target, &bodies, 0.49, now).unwrap();
    assert_eq!(vessel.state.orbit.body, KERBIN);
    assert_eq!(vessel.state.orbit.mu, MU);
    assert!(vessel.state.landed);
    assert!(!vessel.state.splashed);

    let mut vessel = TestVessel::new(true);
    interpolate(&mut vessel, &previous, &target, &bodies, 0.5, now).unwrap();
    assert_eq!(vessel.state.orbit.body, MUN);
    assert_eq!(vessel.state.orbit.mu, 6.5138e10);
    assert!(!vessel.state.landed);
    assert!(vessel.state.splashed);
    // The Mun has no atmosphere.
    assert_eq!(vessel.state.static_pressure, 0.0);
}

#[test]
fn unknown_body() {
    let (previous, target) = diverging();
    let mut bodies = BodyCatalog::new();
    bodies.insert(Body {
        id: MUN,
        mu: 6.5138e10,
        radius: 200_000.0,
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        atmosphere: None,
    });

    let mut vessel = TestVessel::new(true);
    let before = vessel.state.clone();
    assert_eq!(
        interpolate(&mut vessel, &previous, &target, &bodies, 0.5, UniversalTime(11.0)),
        Err(InterpolateError::UnknownBody(KERBIN))
    );
    assert_eq!(vessel.state, before);
    assert!(vessel.events.is_empty());
}

#[test]
fn single_snapshot_leaves_vessel_untouched() {
    let mut pair = SnapshotPair::new();
    pair.push(snapshot(&message(10.0)).into()).unwrap();

    let mut vessel = TestVessel::new(true);
    let before = vessel.clone();

    assert_eq!(
        interpolate_pair(&mut vessel, &pair, &bodies(), 0.5, UniversalTime(10.2)),
        Err(InterpolateError::Incomplete)
    );
    assert_eq!(vessel.state, before.state);
    assert_eq!(vessel.parts, before.parts);
    assert!(vessel.events.is_empty());
}

#[test]
fn same_trajectory_does_not_drift() {
    let first = snapshot(&message(10.0));

    // The second snapshot lies on the same trajectory, only captured later.
    let (position, velocity) = first.orbit.state_at(UniversalTime(10.5));
    let mut msg = message(10.5);
    msg.position = position;
    msg.velocity = velocity;
    let second = snapshot(&msg);

    let bodies = bodies();
    let now = UniversalTime(10.8);
    let (expected, _) = first.orbit.state_at(now);

    for percentage in [0.0, 0.25, 0.5, 0.75, 1.0] {
        let mut vessel = TestVessel::new(true);
        interpolate(&mut vessel, &first, &second, &bodies, percentage, now).unwrap();

        assert_vec_eq(vessel.state.orbit.position, expected, 1e-3);
        let pose = vessel.pose.unwrap();
        assert!(pose
            .rotation
            .abs_diff_eq(bodies.get(KERBIN).unwrap().rotation, 1e-9));
    }
}

#[test]
fn unloaded_landed_vessel_snaps_to_target() {
    let mut previous = message(10.0);
    previous.landed = true;
    previous.lat_lon_alt = LatLonAlt::new(-0.1, -74.5, 70.0);
    let mut target = message(10.5);
    target.landed = true;
    target.lat_lon_alt = LatLonAlt::new(-0.2, -74.6, 75.0);

    let bodies = bodies();
    let previous = Snapshot::from_message(&previous, &bodies).unwrap();
    let target = Snapshot::from_message(&target, &bodies).unwrap();

    let mut vessel = TestVessel::new(false);
    vessel.state.landed = true;
    interpolate(&mut vessel, &previous, &target, &bodies, 0.2, UniversalTime(10.6)).unwrap();

    assert_eq!(vessel.state.lat_lon_alt, target.lat_lon_alt);
    let lla = target.lat_lon_alt;
    let expected = bodies
        .get(KERBIN)
        .unwrap()
        .surface_position(lla.latitude, lla.longitude, lla.altitude);
    assert_eq!(vessel.position, Some(expected));

    // Unloaded entities never have their parts moved.
    assert_eq!(vessel.events, [Event::SetPosition]);
    assert!(vessel.pose.is_none());
}

#[test]
fn unloaded_flying_vessel_keeps_position() {
    let (previous, target) = diverging();

    let mut vessel = TestVessel::new(false);
    interpolate(&mut vessel, &previous, &target, &bodies(), 0.2, UniversalTime(10.6)).unwrap();

    assert_eq!(vessel.state.lat_lon_alt, target.lat_lon_alt);
    assert!(vessel.events.is_empty());
    assert!(vessel.position.is_none());
}

#[test]
fn loaded_surface_vessel_uses_lat_lon_alt() {
    let mut previous = message(10.0);
    previous.landed = true;
    previous.lat_lon_alt = LatLonAlt::new(0.0, 10.0, 50.0);
    let mut target = message(10.5);
    target.landed = true;
    target.lat_lon_alt = LatLonAlt::new(0.0, 20.0, 70.0);

    let bodies = bodies();
    let previous = Snapshot::from_message(&previous, &bodies).unwrap();
    let target = Snapshot::from_message(&target, &bodies).unwrap();

    let mut vessel = TestVessel::new(true);
    vessel.situation = Situation::Landed;
    interpolate(&mut vessel, &previous, &target, &bodies, 0.5, UniversalTime(10.6)).unwrap();

    assert_eq!(vessel.state.lat_lon_alt, LatLonAlt::new(0.0, 15.0, 60.0));
    let expected = bodies
        .get(KERBIN)
        .unwrap()
        .surface_position(0.0, 15.0, 60.0);
    assert_vec_eq(vessel.pose.unwrap().position, expected, 1e-6);
}

#[test]
fn unpacked_vessel_moves_significant_parts() {
    let (previous, target) = diverging();
    let mut vessel = TestVessel::new(true);
    let original = vessel.parts.clone();

    interpolate(&mut vessel, &previous, &target, &bodies(), 0.4, UniversalTime(10.6)).unwrap();

    let pose = vessel.pose.unwrap();
    assert_placed(&vessel.parts[0], &original[0], pose);
    assert_placed(&vessel.parts[2], &original[2], pose);
    // Not physically significant.
    assert_eq!(vessel.parts[1], original[1]);

    // Velocities are corrected after all positions have been written.
    assert_eq!(
        vessel.events,
        [
            Event::SetPose,
            Event::ResumeVelocity,
            Event::ResumePart(0),
            Event::ResumePart(2),
        ]
    );
}

#[test]
fn packed_vessel_moves_all_parts() {
    let (previous, target) = diverging();
    let mut vessel = TestVessel::new(true);
    vessel.packed = true;
    let original = vessel.parts.clone();

    interpolate(&mut vessel, &previous, &target, &bodies(), 0.4, UniversalTime(10.6)).unwrap();

    let pose = vessel.pose.unwrap();
    for (part, original) in vessel.parts.iter().zip(&original) {
        assert_placed(part, original, pose);
    }

    // Packed entities have no rigid bodies to correct.
    assert_eq!(vessel.events, [Event::SetPose]);
}

#[test]
fn part_velocities_only_resumed_after_root() {
    let (previous, target) = diverging();
    let mut vessel = TestVessel::new(true);
    vessel.velocity_changed = false;

    interpolate(&mut vessel, &previous, &target, &bodies(), 0.4, UniversalTime(10.6)).unwrap();
    assert_eq!(vessel.events, [Event::SetPose, Event::ResumeVelocity]);
}

#[derive(Default)]
struct Fleet(HashMap<EntityId, TestVessel>);

impl Vessels for Fleet {
    type Vessel = TestVessel;

    fn vessel_mut(&mut self, id: EntityId) -> Option<&mut TestVessel> {
        self.0.get_mut(&id)
    }
}

#[test]
fn interpolate_all_entities() {
    let system = SyncSystem::default();
    let bodies = bodies();

    let complete = EntityId::new();
    let incomplete = EntityId::new();
    let despawned = EntityId::new();

    for id in [complete, despawned] {
        system.on_snapshot(id, &message(10.0), &bodies).unwrap();
        system.on_snapshot(id, &message(10.5), &bodies).unwrap();
    }
    system
        .on_snapshot(incomplete, &message(10.5), &bodies)
        .unwrap();

    let mut fleet = Fleet::default();
    fleet.0.insert(complete, TestVessel::new(true));
    fleet.0.insert(incomplete, TestVessel::new(true));

    let stats = system.interpolate_all(&ready, &mut fleet, &bodies, UniversalTime(10.525));
    assert_eq!(stats.interpolated, 1);
    assert_eq!(stats.incomplete, 1);
    assert_eq!(stats.missing, 1);
    assert_eq!(stats.failed, 0);

    assert!(fleet.0[&complete].pose.is_some());
    assert!(fleet.0[&incomplete].events.is_empty());
    assert_eq!(system.metrics().interpolated.get(), 1);
}

#[test]
fn stale_snapshot_ignored() {
    let system = SyncSystem::default();
    let bodies = bodies();
    let id = EntityId::new();

    system.on_snapshot(id, &message(10.0), &bodies).unwrap();
    system.on_snapshot(id, &message(11.0), &bodies).unwrap();
    assert!(system.on_snapshot(id, &message(10.5), &bodies).is_err());

    let mut expected = TestVessel::new(true);
    interpolate(
        &mut expected,
        &snapshot(&message(10.0)),
        &snapshot(&message(11.0)),
        &bodies,
        0.5,
        UniversalTime(11.2),
    )
    .unwrap();

    let mut vessel = TestVessel::new(true);
    system
        .interpolate(&ready, id, &mut vessel, &bodies, 0.5, UniversalTime(11.2))
        .unwrap();
    assert_eq!(vessel.state, expected.state);
}

#[test]
fn closed_gate_leaves_vessels_untouched() {
    let system = SyncSystem::default();
    let bodies = bodies();
    let id = EntityId::new();

    system.on_snapshot(id, &message(10.0), &bodies).unwrap();
    system.on_snapshot(id, &message(10.5), &bodies).unwrap();

    let mut fleet = Fleet::default();
    fleet.0.insert(id, TestVessel::new(true));
    let before = fleet.0[&id].clone();

    let closed = || false;
    let stats = system.interpolate_all(&closed, &mut fleet, &bodies, UniversalTime(10.525));
    assert_eq!(stats, InterpolateStats::default());

    let mut vessel = TestVessel::new(true);
    assert_eq!(
        system.interpolate(&closed, id, &mut vessel, &bodies, 0.5, UniversalTime(10.525)),
        Err(InterpolateError::NotReady)
    );
    assert!(vessel.events.is_empty());

    let vessel = &fleet.0[&id];
    assert_eq!(vessel.state, before.state);
    assert_eq!(vessel.parts, before.parts);
    assert!(vessel.events.is_empty());
    assert_eq!(system.metrics().interpolated.get(), 0);
}

#[test]
fn zero_rotation_never_reaches_vessel() {
    let system = SyncSystem::default();
    let bodies = bodies();
    let id = EntityId::new();

    system.on_snapshot(id, &message(10.0), &bodies).unwrap();

    let mut degenerate = message(10.5);
    degenerate.surface_rotation = DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0);
    assert_eq!(
        system.on_snapshot(id, &degenerate, &bodies),
        Err(SnapshotError::InvalidRotation)
    );

    let mut vessel = TestVessel::new(true);
    assert_eq!(
        system.interpolate(&ready, id, &mut vessel, &bodies, 0.3, UniversalTime(10.6)),
        Err(InterpolateError::Incomplete)
    );

    system.on_snapshot(id, &message(10.5), &bodies).unwrap();
    system
        .interpolate(&ready, id, &mut vessel, &bodies, 0.3, UniversalTime(10.6))
        .unwrap();

    let pose = vessel.pose.unwrap();
    assert!(pose.rotation.is_finite());
    assert!(pose.position.is_finite());
    assert!(vessel.parts.iter().all(|part| part.pose.position.is_finite()));
}
