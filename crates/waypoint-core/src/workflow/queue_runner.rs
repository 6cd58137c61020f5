//! Bulk queue runner.
//!
//! Processes a work queue's items one at a time in stored order. Items are
//! independent: a failed item is recorded and the run moves on. Each status
//! change goes through `QueueManager::set_item_status`, so a concurrent
//! writer is detected and retried rather than clobbered. An item another
//! writer completed is never executed or overwritten. Cancellation is
//! checked between items only.

use waypoint_types::event::{EventScope, ProgressEvent};
use waypoint_types::queue::{QueueProgress, WorkItem, WorkItemStatus, WorkQueue};

use crate::event::EventBus;
use crate::storage::DocumentStore;

use super::cancel::CancellationScopes;
use super::executor::ExecutorError;
use super::queue::{QueueError, QueueManager, StatusUpdate};
use super::step_runner::{ItemExecutor, ItemVerdict};

/// Which items a run picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueRunMode {
    /// Pending items, plus InProgress items left behind by a crash.
    #[default]
    Pending,
    /// Failed items, if the queue allows retries and the item has attempts
    /// left.
    RetryFailed,
}

/// Counts from one queue run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRunSummary {
    pub queue_id: String,
    /// Items handed to the executor.
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items the executor reported as skipped.
    pub skipped: usize,
    /// Items already Completed or Skipped before the run reached them.
    pub already_done: usize,
    /// Items not eligible under the run mode.
    pub passed_over: usize,
    pub cancelled: bool,
    /// Aggregate status after the run.
    pub status: WorkItemStatus,
    pub progress: QueueProgress,
}

impl QueueRunSummary {
    fn new(queue_id: &str) -> Self {
        Self {
            queue_id: queue_id.to_string(),
            processed: 0,
            completed: 0,
            failed: 0,
            skipped: 0,
            already_done: 0,
            passed_over: 0,
            cancelled: false,
            status: WorkItemStatus::Pending,
            progress: QueueProgress::default(),
        }
    }
}

/// Runs work queues through an `ItemExecutor`.
pub struct QueueRunner<S: DocumentStore, X: ItemExecutor> {
    queues: QueueManager<S>,
    executor: X,
    event_bus: EventBus,
    scopes: CancellationScopes,
}

impl<S: DocumentStore, X: ItemExecutor> QueueRunner<S, X> {
    pub fn new(
        queues: QueueManager<S>,
        executor: X,
        event_bus: EventBus,
        scopes: CancellationScopes,
    ) -> Self {
        Self {
            queues,
            executor,
            event_bus,
            scopes,
        }
    }

    pub fn queues(&self) -> &QueueManager<S> {
        &self.queues
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn scopes(&self) -> &CancellationScopes {
        &self.scopes
    }

    /// Process the eligible items of `queue_id`.
    pub async fn run(
        &self,
        queue_id: &str,
        mode: QueueRunMode,
    ) -> Result<QueueRunSummary, ExecutorError> {
        self.scopes.queue_run.reset();
        self.scopes.operations.reset();

        let queue = self.require_queue(queue_id).await?;
        let plugin_ids: Vec<String> = queue.items.iter().map(|i| i.plugin_id.clone()).collect();
        let retries = self.queues.status_update_retries();
        let mut summary = QueueRunSummary::new(queue_id);

        tracing::info!(
            queue_id,
            mode = ?mode,
            items = plugin_ids.len(),
            "starting queue run"
        );

        for plugin_id in &plugin_ids {
            // Re-read so that changes made by other writers are respected.
            let fresh = self.require_queue(queue_id).await?;
            let Some(item) = fresh.item(plugin_id).cloned() else {
                tracing::warn!(queue_id, plugin_id = plugin_id.as_str(), "item vanished from queue");
                continue;
            };

            if item.status.is_done() {
                self.event_bus.publish(ProgressEvent::item(
                    plugin_id,
                    item.status,
                    format!("{} already {}", item.display_name, item.status),
                ));
                summary.already_done += 1;
                continue;
            }

            if !is_eligible(&fresh, &item, mode) {
                tracing::debug!(
                    queue_id,
                    plugin_id = plugin_id.as_str(),
                    status = %item.status,
                    attempts = item.attempts,
                    "item not eligible for this run"
                );
                summary.passed_over += 1;
                continue;
            }

            if self.scopes.queue_run.is_cancelled() {
                tracing::info!(queue_id, plugin_id = plugin_id.as_str(), "queue run cancelled");
                summary.cancelled = true;
                break;
            }

            let claim = self
                .queues
                .set_item_status(queue_id, plugin_id, WorkItemStatus::InProgress, None, retries)
                .await?;
            match claim {
                StatusUpdate::Applied => {}
                StatusUpdate::AlreadyCompleted => {
                    tracing::debug!(
                        queue_id,
                        plugin_id = plugin_id.as_str(),
                        "item completed by another writer before claim"
                    );
                    self.publish_completed_elsewhere(&item);
                    summary.already_done += 1;
                    continue;
                }
                StatusUpdate::Conflicted => {
                    self.event_bus.publish(ProgressEvent::item(
                        plugin_id,
                        WorkItemStatus::Failed,
                        "could not claim item: concurrent updates",
                    ));
                    summary.failed += 1;
                    continue;
                }
            }
            self.event_bus.publish(ProgressEvent::item(
                plugin_id,
                WorkItemStatus::InProgress,
                format!("processing {}", item.display_name),
            ));

            let result = self.executor.execute(&item, &self.scopes.operations).await;
            summary.processed += 1;

            let status = WorkItemStatus::from(result.verdict);
            let error = (result.verdict == ItemVerdict::Failed).then_some(result.message.as_str());
            let recorded = self
                .queues
                .set_item_status(queue_id, plugin_id, status, error, retries)
                .await?;
            match recorded {
                StatusUpdate::Applied => {}
                StatusUpdate::AlreadyCompleted => {
                    self.publish_completed_elsewhere(&item);
                    summary.already_done += 1;
                    continue;
                }
                StatusUpdate::Conflicted => {
                    self.event_bus.publish(ProgressEvent::item(
                        plugin_id,
                        WorkItemStatus::Failed,
                        "could not record result: concurrent updates",
                    ));
                    summary.failed += 1;
                    continue;
                }
            }

            match result.verdict {
                ItemVerdict::Completed => summary.completed += 1,
                ItemVerdict::Failed => summary.failed += 1,
                ItemVerdict::Skipped => summary.skipped += 1,
            }
            self.event_bus
                .publish(ProgressEvent::item(plugin_id, status, result.message));
        }

        let finished = self.require_queue(queue_id).await?;
        summary.status = finished.status;
        summary.progress = finished.progress;

        let terminal = if summary.cancelled {
            "cancelled".to_string()
        } else {
            finished.status.to_string()
        };
        self.event_bus.publish(ProgressEvent::new(
            EventScope::Queue,
            queue_id,
            terminal,
            format!(
                "{} processed, {} completed, {} failed",
                summary.processed, summary.completed, summary.failed
            ),
        ));

        tracing::info!(
            queue_id,
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            status = %summary.status,
            "queue run finished"
        );

        Ok(summary)
    }

    fn publish_completed_elsewhere(&self, item: &WorkItem) {
        self.event_bus.publish(ProgressEvent::item(
            &item.plugin_id,
            WorkItemStatus::Completed,
            format!("{} already completed", item.display_name),
        ));
    }

    async fn require_queue(&self, queue_id: &str) -> Result<WorkQueue, ExecutorError> {
        self.queues
            .load_queue(queue_id)
            .await?
            .ok_or_else(|| QueueError::QueueNotFound(queue_id.to_string()).into())
    }
}

fn is_eligible(queue: &WorkQueue, item: &WorkItem, mode: QueueRunMode) -> bool {
    match mode {
        QueueRunMode::Pending => matches!(
            item.status,
            WorkItemStatus::Pending | WorkItemStatus::InProgress
        ),
        QueueRunMode::RetryFailed => {
            item.status == WorkItemStatus::Failed
                && queue.config.allow_retry
                && item.attempts < queue.config.default_max_retries
        }
    }
}
