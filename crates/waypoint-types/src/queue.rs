//! Work queue types.
//!
//! A `WorkQueue` is a named batch of independent, plugin-scoped `WorkItem`s.
//! Its `status` and `progress` are derived from the items and recomputed from
//! scratch on every mutation (see `waypoint_core::workflow::reducer`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current on-disk format version for queue documents.
pub const QUEUE_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    QUEUE_SCHEMA_VERSION
}

// ---------------------------------------------------------------------------
// WorkItemStatus
// ---------------------------------------------------------------------------

/// Status of a work item, also used for the derived queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl WorkItemStatus {
    /// Completed or Skipped: nothing left to do for this item.
    pub fn is_done(self) -> bool {
        matches!(self, WorkItemStatus::Completed | WorkItemStatus::Skipped)
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItemStatus::Pending => write!(f, "pending"),
            WorkItemStatus::InProgress => write!(f, "in_progress"),
            WorkItemStatus::Completed => write!(f, "completed"),
            WorkItemStatus::Failed => write!(f, "failed"),
            WorkItemStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl FromStr for WorkItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(WorkItemStatus::Pending),
            "in_progress" => Ok(WorkItemStatus::InProgress),
            "completed" => Ok(WorkItemStatus::Completed),
            "failed" => Ok(WorkItemStatus::Failed),
            "skipped" => Ok(WorkItemStatus::Skipped),
            other => Err(format!("invalid work item status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// Informational summary of the operations collected for a work item.
///
/// Never drives status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemStats {
    /// Number of collected operation records.
    pub operations: usize,
    /// Count per operation kind (the record's `type` field, or "unknown").
    #[serde(default)]
    pub by_kind: BTreeMap<String, usize>,
}

impl WorkItemStats {
    /// Summarize a list of opaque operation records.
    pub fn from_operations(operations: &[serde_json::Value]) -> Self {
        let mut by_kind = BTreeMap::new();
        for op in operations {
            let kind = op
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            *by_kind.entry(kind).or_insert(0) += 1;
        }
        Self {
            operations: operations.len(),
            by_kind,
        }
    }
}

/// One independently schedulable unit of a bulk queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    /// Unique within its queue.
    pub plugin_id: String,
    pub display_name: String,
    pub status: WorkItemStatus,
    /// Opaque operation records collected for this plugin.
    #[serde(default)]
    pub operations: Vec<serde_json::Value>,
    #[serde(default)]
    pub stats: WorkItemStats,
    /// Number of times this item entered InProgress.
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkItem {
    /// A fresh Pending item for one plugin's collected operations.
    pub fn new(
        plugin_id: impl Into<String>,
        display_name: impl Into<String>,
        operations: Vec<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        let stats = WorkItemStats::from_operations(&operations);
        Self {
            id: Uuid::now_v7(),
            plugin_id: plugin_id.into(),
            display_name: display_name.into(),
            status: WorkItemStatus::Pending,
            operations,
            stats,
            attempts: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// Search/selection criteria the queue was collected with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    /// Human-readable label, also used to derive the queue id.
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl SelectionCriteria {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Run configuration shared by a queue's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub selection: SelectionCriteria,
    pub allow_retry: bool,
    pub default_max_retries: u32,
}

/// Item counts by category. The four categories always sum to `total`.
///
/// Skipped items are counted as `completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_progress: usize,
}

impl QueueProgress {
    /// Sum of the four categories.
    pub fn category_sum(&self) -> usize {
        self.completed + self.failed + self.pending + self.in_progress
    }
}

/// A named collection of work items sharing a run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkQueue {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: QueueConfig,
    /// Ordered items; `plugin_id` is unique.
    pub items: Vec<WorkItem>,
    /// Derived aggregate status.
    pub status: WorkItemStatus,
    /// Derived counts.
    pub progress: QueueProgress,
}

impl WorkQueue {
    /// Look up an item by plugin id.
    pub fn item(&self, plugin_id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|i| i.plugin_id == plugin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_operation_kinds() {
        let ops = vec![
            serde_json::json!({"type": "update", "target": "a"}),
            serde_json::json!({"type": "update", "target": "b"}),
            serde_json::json!({"type": "remove"}),
            serde_json::json!("opaque"),
        ];
        let stats = WorkItemStats::from_operations(&ops);
        assert_eq!(stats.operations, 4);
        assert_eq!(stats.by_kind["update"], 2);
        assert_eq!(stats.by_kind["remove"], 1);
        assert_eq!(stats.by_kind["unknown"], 1);
    }

    #[test]
    fn new_item_is_pending() {
        let item = WorkItem::new("plugin-x", "Plugin X", vec![], Utc::now());
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert!(item.started_at.is_none());
        assert_eq!(WorkItemStatus::default(), WorkItemStatus::Pending);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkItemStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(
            "in-progress".parse::<WorkItemStatus>().unwrap(),
            WorkItemStatus::InProgress
        );
    }

    #[test]
    fn done_covers_completed_and_skipped() {
        assert!(WorkItemStatus::Completed.is_done());
        assert!(WorkItemStatus::Skipped.is_done());
        assert!(!WorkItemStatus::Failed.is_done());
    }
}
