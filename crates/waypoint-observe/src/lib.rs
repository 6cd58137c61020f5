//! Observability setup for Waypoint: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
