//! Progress events pushed to external observers.
//!
//! Delivery is best-effort: the orchestrator publishes and moves on, there
//! is no acknowledgement or backpressure from subscribers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    /// One pipeline step; `id` is the step index.
    Step,
    /// One work item; `id` is the plugin id.
    Item,
    /// Terminal pipeline notification; `id` is the task id.
    Pipeline,
    /// Terminal queue-run notification; `id` is the queue id.
    Queue,
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventScope::Step => write!(f, "step"),
            EventScope::Item => write!(f, "item"),
            EventScope::Pipeline => write!(f, "pipeline"),
            EventScope::Queue => write!(f, "queue"),
        }
    }
}

/// A progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub scope: EventScope,
    pub id: String,
    /// Lowercase status name (e.g. "running", "completed", "cancelled").
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        scope: EventScope,
        id: impl Into<String>,
        status: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            id: id.into(),
            status: status.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Event for a pipeline step.
    pub fn step(index: u32, status: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(EventScope::Step, index.to_string(), status, message)
    }

    /// Event for a work item.
    pub fn item(plugin_id: &str, status: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(EventScope::Item, plugin_id, status, message)
    }

    /// Whether this is a terminal run notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self.scope, EventScope::Pipeline | EventScope::Queue)
    }

    /// Same event with the timestamp dropped, for comparing event streams.
    pub fn signature(&self) -> (EventScope, &str, &str, &str) {
        (self.scope, &self.id, &self.status, &self.message)
    }
}
