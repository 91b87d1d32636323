//! The synchronized clock all peers agree on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use game_common::time::UniversalTime;

/// A source of the current synchronized universal time.
pub trait Clock: Send + Sync {
    fn now(&self) -> UniversalTime;
}

impl<F> Clock for F
where
    F: Fn() -> UniversalTime + Send + Sync,
{
    #[inline]
    fn now(&self) -> UniversalTime {
        self()
    }
}

/// A local monotonic clock shifted by an offset to the server clock.
///
/// The offset is updated by time synchronization while other threads keep reading the clock.
#[derive(Debug)]
pub struct SyncedClock {
    start: Instant,
    /// The universal time at `start`, stored as `f64` bits.
    offset: AtomicU64,
}

impl SyncedClock {
    pub fn new(now: UniversalTime) -> Self {
        Self {
            start: Instant::now(),
            offset: AtomicU64::new(now.as_secs().to_bits()),
        }
    }

    /// Shifts the clock so that it reads `now` at this instant.
    pub fn sync(&self, now: UniversalTime) {
        let elapsed = self.start.elapsed().as_secs_f64();
        let offset = now.as_secs() - elapsed;
        self.offset.store(offset.to_bits(), Ordering::Release);
    }

    pub fn offset(&self) -> f64 {
        f64::from_bits(self.offset.load(Ordering::Acquire))
    }
}

impl Clock for SyncedClock {
    fn now(&self) -> UniversalTime {
        UniversalTime(self.offset() + self.start.elapsed().as_secs_f64())
    }
}
