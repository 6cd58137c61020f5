//! Infrastructure layer for Waypoint.
//!
//! Contains the filesystem implementation of the `DocumentStore` port defined
//! in `waypoint-core`, the `config.toml` loader, and data directory
//! resolution.

pub mod config;
pub mod filesystem;
pub mod storage;
