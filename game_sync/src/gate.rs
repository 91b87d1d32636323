//! Readiness of the simulation to receive remote state.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::Dispatch;

/// Decides whether dispatching and interpolation should run at all.
pub trait Readiness: Send + Sync {
    fn is_ready(&self) -> bool;
}

impl<F> Readiness for F
where
    F: Fn() -> bool + Send + Sync,
{
    #[inline]
    fn is_ready(&self) -> bool {
        self()
    }
}

/// The scene currently loaded by the simulation.
///
/// Scenes are ordered: every scene after [`Scene::SpaceCenter`] hosts remote entities.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Scene {
    Loading,
    MainMenu,
    SpaceCenter,
    Editor,
    Flight,
    TrackingStation,
}

impl Scene {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Loading,
            1 => Self::MainMenu,
            2 => Self::SpaceCenter,
            3 => Self::Editor,
            4 => Self::Flight,
            _ => Self::TrackingStation,
        }
    }
}

/// A [`Readiness`] gate opening once a scene with remote entities has been loaded for longer
/// than the settle delay.
#[derive(Debug)]
pub struct SceneGate {
    enabled: AtomicBool,
    scene: AtomicU8,
    loaded_at: Mutex<Instant>,
    settle_delay: Duration,
}

impl SceneGate {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            scene: AtomicU8::new(Scene::Loading as u8),
            loaded_at: Mutex::new(Instant::now()),
            settle_delay,
        }
    }

    /// Creates a new `SceneGate` waiting for the configured settle delay.
    pub fn from_config(config: &Dispatch) -> Self {
        Self::new(config.settle_delay())
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Records that `scene` has just finished loading.
    pub fn scene_loaded(&self, scene: Scene) {
        self.scene_loaded_at(scene, Instant::now());
    }

    pub fn scene_loaded_at(&self, scene: Scene, at: Instant) {
        *self.loaded_at.lock() = at;
        self.scene.store(scene as u8, Ordering::Release);
    }

    pub fn scene(&self) -> Scene {
        Scene::from_u8(self.scene.load(Ordering::Acquire))
    }

    /// Returns `true` if the gate is open at `now`.
    pub fn is_ready_at(&self, now: Instant) -> bool {
        if !self.enabled.load(Ordering::Acquire) || self.scene() < Scene::SpaceCenter {
            return false;
        }

        let loaded_at = *self.loaded_at.lock();
        now.saturating_duration_since(loaded_at) > self.settle_delay
    }
}

impl Readiness for SceneGate {
    fn is_ready(&self) -> bool {
        self.is_ready_at(Instant::now())
    }
}
