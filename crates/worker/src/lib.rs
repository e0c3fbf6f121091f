//! Simulation worker: claims queued matches, runs the engine and records
//! the outcome.

pub mod artifacts;
pub mod config;
pub mod pipeline;
pub mod poller;
pub mod registry;
pub mod store;
pub mod sweeper;
