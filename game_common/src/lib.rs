//! Types shared between the network layer and the simulation.

pub mod entity;
pub mod metrics;
pub mod time;
