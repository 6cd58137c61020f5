//! Pure work-item reducer.
//!
//! `apply_mutation` is the whole of the item-status update logic with no I/O:
//! it takes the current items and one requested change and returns the new
//! items. `QueueManager::set_item_status` wraps it in the
//! read-modify-write-verify loop. Progress and aggregate status are always
//! recounted from the full item list.

use chrono::{DateTime, Utc};
use waypoint_types::queue::{QueueProgress, WorkItem, WorkItemStatus, WorkQueue};

/// A requested status change for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMutation {
    pub plugin_id: String,
    pub status: WorkItemStatus,
    pub error: Option<String>,
}

impl ItemMutation {
    pub fn new(plugin_id: impl Into<String>, status: WorkItemStatus) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            status,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Result of reducing one mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// The mutation changed the items.
    Applied(Vec<WorkItem>),
    /// The item is Completed, which already satisfies any request. Nothing
    /// is written.
    AlreadySatisfied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReduceError {
    #[error("no item for plugin '{0}'")]
    ItemNotFound(String),
}

/// Apply `mutation` to `items`.
///
/// Completed is a one-way latch: a Completed item is never moved to another
/// status. Entering InProgress bumps `attempts` and stamps `started_at` the
/// first time; entering Completed stamps `completed_at`.
pub fn apply_mutation(
    items: &[WorkItem],
    mutation: &ItemMutation,
    now: DateTime<Utc>,
) -> Result<Reduction, ReduceError> {
    let position = items
        .iter()
        .position(|item| item.plugin_id == mutation.plugin_id)
        .ok_or_else(|| ReduceError::ItemNotFound(mutation.plugin_id.clone()))?;

    let current = &items[position];
    if current.status == WorkItemStatus::Completed && mutation.status != WorkItemStatus::Completed
    {
        return Ok(Reduction::AlreadySatisfied);
    }

    let mut next = items.to_vec();
    let item = &mut next[position];

    if mutation.status == WorkItemStatus::InProgress && item.status != WorkItemStatus::InProgress {
        item.attempts += 1;
        if item.started_at.is_none() {
            item.started_at = Some(now);
        }
    }
    if mutation.status == WorkItemStatus::Completed && item.completed_at.is_none() {
        item.completed_at = Some(now);
    }

    item.status = mutation.status;
    item.error = mutation.error.clone();

    Ok(Reduction::Applied(next))
}

/// Count items per category. Skipped counts as completed.
pub fn compute_progress(items: &[WorkItem]) -> QueueProgress {
    let mut progress = QueueProgress {
        total: items.len(),
        ..QueueProgress::default()
    };
    for item in items {
        match item.status {
            WorkItemStatus::Completed | WorkItemStatus::Skipped => progress.completed += 1,
            WorkItemStatus::Failed => progress.failed += 1,
            WorkItemStatus::Pending => progress.pending += 1,
            WorkItemStatus::InProgress => progress.in_progress += 1,
        }
    }
    progress
}

/// Derive the queue status from its items (first matching rule wins).
///
/// | items                                  | status     |
/// |----------------------------------------|------------|
/// | any InProgress                         | InProgress |
/// | all Completed or Skipped (or none)     | Completed  |
/// | all Failed                             | Failed     |
/// | some Completed/Skipped or Failed       | InProgress |
/// | otherwise (all Pending)                | Pending    |
pub fn aggregate_status(items: &[WorkItem]) -> WorkItemStatus {
    if items.iter().any(|i| i.status == WorkItemStatus::InProgress) {
        return WorkItemStatus::InProgress;
    }
    if items.iter().all(|i| i.status.is_done()) {
        return WorkItemStatus::Completed;
    }
    if items.iter().all(|i| i.status == WorkItemStatus::Failed) {
        return WorkItemStatus::Failed;
    }
    if items
        .iter()
        .any(|i| i.status.is_done() || i.status == WorkItemStatus::Failed)
    {
        return WorkItemStatus::InProgress;
    }
    WorkItemStatus::Pending
}

/// Recompute a queue's derived fields from its items.
pub fn recompute(queue: &mut WorkQueue) {
    queue.progress = compute_progress(&queue.items);
    queue.status = aggregate_status(&queue.items);
}
