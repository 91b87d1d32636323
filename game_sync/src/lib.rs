//! Client-side synchronization of remote entities.
//!
//! Two independent mechanisms keep the local copies of remote entities in line with their
//! authoritative state:
//!
//! - Discrete field changes are buffered per entity and applied by a [`Dispatcher`] once the
//!   synchronized clock reaches their scheduled time.
//! - Continuous state (position, velocity, rotation) arrives as snapshots and is blended every
//!   tick between the two newest snapshots by [`interpolate`](interpolate::interpolate).
//!
//! [`SyncSystem`] ties both together.

pub mod body;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod field;
pub mod gate;
pub mod interpolate;
pub mod metrics;
pub mod orbit;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod snapshot;
pub mod system;
pub mod vessel;

pub use dispatch::{spawn_dispatch_loop, DispatchStats, DispatchTask, Dispatcher};
pub use field::{ApplyError, FieldSink, FieldUpdate, FieldValue, UpdateError};
pub use system::{InterpolateStats, SyncSystem};
