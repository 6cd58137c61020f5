//! Executor contracts for pipeline steps and queue items.
//!
//! The engine never performs the work itself. A `StepExecutor` runs one
//! pipeline step and an `ItemExecutor` runs one work item; both report an
//! ordinary result value, and the orchestrators translate it into persisted
//! state transitions. Timeouts belong to the executor and come back as a
//! failed result.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;
use waypoint_types::pipeline::StepSpec;
use waypoint_types::queue::{WorkItem, WorkItemStatus};

use super::cancel::CancelSignal;

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Everything a step executor gets to see.
#[derive(Debug, Clone)]
pub struct StepInputs {
    pub task_id: Uuid,
    pub step: StepSpec,
    /// Caller-supplied task payload.
    pub payload: Value,
    /// Outputs written by earlier steps.
    pub outputs: BTreeMap<String, String>,
}

impl StepInputs {
    /// Look up an output written by an earlier step.
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }
}

/// What a step executor reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub success: bool,
    pub message: String,
    /// Opaque data stored on the step record.
    pub data: Option<Value>,
    /// Named outputs to merge into the task before the next step starts.
    pub outputs: BTreeMap<String, String>,
}

impl StepResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            outputs: BTreeMap::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }
}

/// Runs a single pipeline step.
///
/// May be re-invoked for a step only while that step is not yet recorded
/// Completed.
pub trait StepExecutor: Send + Sync {
    fn execute(
        &self,
        inputs: &StepInputs,
    ) -> impl std::future::Future<Output = StepResult> + Send;
}

// ---------------------------------------------------------------------------
// Queue items
// ---------------------------------------------------------------------------

/// Final verdict of an item executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemVerdict {
    Completed,
    Failed,
    Skipped,
}

impl From<ItemVerdict> for WorkItemStatus {
    fn from(verdict: ItemVerdict) -> Self {
        match verdict {
            ItemVerdict::Completed => WorkItemStatus::Completed,
            ItemVerdict::Failed => WorkItemStatus::Failed,
            ItemVerdict::Skipped => WorkItemStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub verdict: ItemVerdict,
    pub message: String,
}

impl ItemResult {
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            verdict: ItemVerdict::Completed,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            verdict: ItemVerdict::Failed,
            message: message.into(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            verdict: ItemVerdict::Skipped,
            message: message.into(),
        }
    }
}

/// Runs a single work item.
///
/// `operations` is the finer cancellation scope: the executor may check it
/// between the item's own sub-operations and stop early, reporting Failed or
/// Skipped.
pub trait ItemExecutor: Send + Sync {
    fn execute(
        &self,
        item: &WorkItem,
        operations: &CancelSignal,
    ) -> impl std::future::Future<Output = ItemResult> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_result_builders() {
        let result = StepResult::ok("exported")
            .with_output("report_path", "/tmp/report.csv")
            .with_data(serde_json::json!({"rows": 12}));
        assert!(result.success);
        assert_eq!(result.outputs["report_path"], "/tmp/report.csv");
        assert_eq!(result.data, Some(serde_json::json!({"rows": 12})));

        let failed = StepResult::failed("no rows");
        assert!(!failed.success);
        assert!(failed.outputs.is_empty());
    }

    #[test]
    fn verdict_maps_to_item_status() {
        assert_eq!(WorkItemStatus::from(ItemVerdict::Completed), WorkItemStatus::Completed);
        assert_eq!(WorkItemStatus::from(ItemVerdict::Failed), WorkItemStatus::Failed);
        assert_eq!(WorkItemStatus::from(ItemVerdict::Skipped), WorkItemStatus::Skipped);
    }

    #[test]
    fn inputs_output_lookup() {
        let mut outputs = BTreeMap::new();
        outputs.insert("report_path".to_string(), "/r".to_string());
        let inputs = StepInputs {
            task_id: Uuid::nil(),
            step: StepSpec::new(5, "publish_summary", ""),
            payload: Value::Null,
            outputs,
        };
        assert_eq!(inputs.output("report_path"), Some("/r"));
        assert_eq!(inputs.output("summary_path"), None);
    }
}
