//! ember-core library.
//!
//! Incident lifecycle engine: the incident aggregate and its checklists,
//! the status state machine, the audit timeline, filtered listings and
//! statistics over a SQLite store, and the service that ties mutations,
//! persistence and telemetry together.

pub mod checklist;
pub mod collab;
pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod model;
pub mod permissions;
pub mod service;
pub mod telemetry;
pub mod timeline;

/// # Conventions
///
/// - **Errors**: engine operations return [`error::Result`]; config and
///   store-opening helpers return `anyhow::Result` with context.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).
pub use error::{Error, ErrorCode, Result};
pub use service::{Collaborators, IncidentService, NewTimelineEntry};
