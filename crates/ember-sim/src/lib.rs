//! ember-sim library.
//!
//! Seeded bulk incident generation for load and UI testing.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod bulk;
pub mod names;
pub mod rng;

pub use bulk::{BulkOptions, GeneratedIncident, PlannedIncident, generate, plan};
pub use rng::DeterministicRng;
