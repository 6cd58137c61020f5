//! Checkpointing and orchestration logic for Waypoint.
//!
//! This crate defines the `DocumentStore` port that the infrastructure layer
//! implements, plus everything built on top of it. It depends only on
//! `waypoint-types` -- never on `waypoint-infra` or any filesystem code.

pub mod event;
pub mod storage;
pub mod workflow;
