//! Shared domain types for Waypoint.
//!
//! This crate contains the checkpointed task model, the work queue model,
//! pipeline definitions, progress events, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod queue;
pub mod task;
