//! Checkpointed task types.
//!
//! A `TaskRecord` is the single in-flight sequential workflow: a fixed-length
//! sequence of `StepRecord`s plus the named artifacts produced along the way.
//! The record is persisted after every transition so that a crashed or
//! cancelled run can resume without redoing completed steps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::PipelineDefinition;

/// Current on-disk format version for task documents.
pub const TASK_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    TASK_SCHEMA_VERSION
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Status of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    /// Whether a step may move from `self` to `next`.
    ///
    /// Steps only advance: Pending -> Running -> {Completed, Failed}. A Failed
    /// step may be re-entered to Running (retry) and a Running step may be
    /// re-marked Running after a crash. A Pending step may go straight to
    /// Failed when it is blocked before it starts. Nothing returns to Pending
    /// and nothing reaches Completed without running.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Running)
                | (Pending, Failed)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Running)
                | (Failed, Failed)
                | (Completed, Completed)
        )
    }

    /// Failed or Running: the states a resume has to pick up from.
    pub fn is_stuck(self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::Running)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            other => Err(format!("invalid step status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// StepRecord
// ---------------------------------------------------------------------------

/// Persisted state of one fixed pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the pipeline. Immutable after creation.
    pub index: u32,
    /// Step name, copied from the pipeline definition for display.
    pub name: String,
    pub status: StepStatus,
    /// Last message reported for this step.
    #[serde(default)]
    pub message: String,
    /// When the status last changed.
    pub timestamp: DateTime<Utc>,
    /// Opaque data returned by the step executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StepRecord {
    /// A fresh Pending step.
    pub fn pending(index: u32, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            index,
            name: name.into(),
            status: StepStatus::Pending,
            message: String::new(),
            timestamp: now,
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

/// The single in-flight sequential task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// UUIDv7 assigned at creation.
    pub id: Uuid,
    /// Caller-supplied input, opaque to the engine.
    pub payload: serde_json::Value,
    /// Pointer into the step sequence, 1..=N+1.
    pub current_step: u32,
    /// Fixed-length ordered step records.
    pub steps: Vec<StepRecord>,
    /// Named artifact paths produced by steps.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// True iff every step is Completed.
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Build a new record with one Pending step per pipeline stage.
    pub fn new(pipeline: &PipelineDefinition, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        let steps = pipeline
            .steps
            .iter()
            .map(|spec| StepRecord::pending(spec.index, spec.name.clone(), now))
            .collect();

        Self {
            schema_version: TASK_SCHEMA_VERSION,
            id: Uuid::now_v7(),
            payload,
            current_step: 1,
            steps,
            outputs: BTreeMap::new(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of steps (N).
    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Look up a step by its 1-based index.
    pub fn step(&self, index: u32) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.index == index)
    }

    /// Mutable lookup by 1-based index.
    pub fn step_mut(&mut self, index: u32) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.index == index)
    }

    /// Index of the first step that is not Completed.
    pub fn first_incomplete(&self) -> Option<u32> {
        self.steps
            .iter()
            .find(|s| s.status != StepStatus::Completed)
            .map(|s| s.index)
    }

    /// Index of the earliest Failed or Running step.
    pub fn first_stuck(&self) -> Option<u32> {
        self.steps
            .iter()
            .find(|s| s.status.is_stuck())
            .map(|s| s.index)
    }

    /// Recompute `completed` from the step statuses.
    pub fn recompute_completed(&mut self) {
        self.completed = !self.steps.is_empty()
            && self.steps.iter().all(|s| s.status == StepStatus::Completed);
    }

    /// Number of Completed steps.
    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_has_all_steps_pending() {
        let pipeline = PipelineDefinition::standard();
        let task = TaskRecord::new(&pipeline, serde_json::json!({"account": "acme"}));

        assert_eq!(task.step_count(), 5);
        assert_eq!(task.current_step, 1);
        assert!(!task.completed);
        assert!(task.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(task.steps[3].name, "export_report");
    }

    #[test]
    fn step_transition_guard() {
        use StepStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Running));
        assert!(Completed.can_transition_to(Completed));

        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn recompute_completed_requires_every_step() {
        let mut task = TaskRecord::new(&PipelineDefinition::standard(), serde_json::Value::Null);
        for step in task.steps.iter_mut().take(4) {
            step.status = StepStatus::Completed;
        }
        task.recompute_completed();
        assert!(!task.completed);

        task.steps[4].status = StepStatus::Completed;
        task.recompute_completed();
        assert!(task.completed);
    }

    #[test]
    fn first_stuck_prefers_earliest() {
        let mut task = TaskRecord::new(&PipelineDefinition::standard(), serde_json::Value::Null);
        task.steps[0].status = StepStatus::Completed;
        task.steps[1].status = StepStatus::Running;
        task.steps[3].status = StepStatus::Failed;
        assert_eq!(task.first_stuck(), Some(2));
        assert_eq!(task.first_incomplete(), Some(2));
    }

    #[test]
    fn step_status_display_and_parse() {
        assert_eq!(StepStatus::Running.to_string(), "running");
        assert_eq!("Completed".parse::<StepStatus>().unwrap(), StepStatus::Completed);
        assert!("bogus".parse::<StepStatus>().is_err());
    }

    #[test]
    fn legacy_document_without_schema_version_parses() {
        let task = TaskRecord::new(&PipelineDefinition::standard(), serde_json::Value::Null);
        let mut value = serde_json::to_value(&task).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let parsed: TaskRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.schema_version, TASK_SCHEMA_VERSION);
        assert_eq!(parsed.id, task.id);
    }
}
