//! Durable checkpoint manager for the sequential step pipeline.
//!
//! Wraps a `DocumentStore` to provide a higher-level API for recording
//! step-level checkpoints. Every transition (pending -> running ->
//! completed/failed) is persisted as a whole-document overwrite to two
//! places: the `tasks/current` slot and a permanent id-keyed copy kept for
//! audit. A crashed, failed or cancelled run resumes from `resume_point`.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;
use waypoint_types::error::StoreError;
use waypoint_types::pipeline::PipelineDefinition;
use waypoint_types::task::{StepStatus, TaskRecord};

use crate::storage::document_store::{load_document, save_document, DocumentStore};
use crate::storage::keys;

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Manages the durable checkpoint of the single in-flight task.
///
/// Generic over `S: DocumentStore` so it works with any storage backend
/// (filesystem, in-memory, etc.). Every state transition is persisted before
/// the caller moves forward.
pub struct CheckpointManager<S: DocumentStore> {
    store: S,
    pipeline: PipelineDefinition,
}

impl<S: DocumentStore> CheckpointManager<S> {
    /// Create a checkpoint manager that builds tasks for `pipeline`.
    pub fn new(store: S, pipeline: PipelineDefinition) -> Self {
        Self { store, pipeline }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The pipeline new tasks are created with.
    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    /// Create a fresh task with every step Pending and persist it.
    ///
    /// Replaces whatever occupied the current slot.
    pub async fn create(&self, payload: Value) -> Result<TaskRecord, CheckpointError> {
        let task = TaskRecord::new(&self.pipeline, payload);
        self.persist(&task).await?;

        tracing::info!(
            task_id = %task.id,
            pipeline = self.pipeline.name.as_str(),
            steps = task.step_count(),
            "created task checkpoint"
        );

        Ok(task)
    }

    /// Read the current task, if any.
    pub async fn load_current(&self) -> Result<Option<TaskRecord>, CheckpointError> {
        Ok(load_document(&self.store, keys::CURRENT_TASK).await?)
    }

    /// Read the permanent copy of a task by id.
    pub async fn load_by_id(&self, id: Uuid) -> Result<Option<TaskRecord>, CheckpointError> {
        Ok(load_document(&self.store, &keys::task(&id)).await?)
    }

    /// Delete the current slot. The id-keyed copy is retained.
    ///
    /// Returns `true` if a current task existed.
    pub async fn clear(&self) -> Result<bool, CheckpointError> {
        let existed = self.store.delete(keys::CURRENT_TASK).await?;
        tracing::debug!(existed, "cleared current task checkpoint");
        Ok(existed)
    }

    // -----------------------------------------------------------------------
    // Step-level checkpoints
    // -----------------------------------------------------------------------

    /// Move step `index` to `status` and persist.
    ///
    /// `data` replaces the step's data when `Some`; `None` keeps what is
    /// there. Completing a step advances `current_step` to `index + 1`.
    /// Returns `Ok(None)` without writing when there is no current task.
    pub async fn transition_step(
        &self,
        index: u32,
        status: StepStatus,
        message: &str,
        data: Option<Value>,
    ) -> Result<Option<TaskRecord>, CheckpointError> {
        let Some(mut task) = self.load_current().await? else {
            tracing::warn!(
                index,
                status = %status,
                "step transition with no current task, ignoring"
            );
            return Ok(None);
        };

        let max = task.step_count();
        let now = Utc::now();
        let step = task
            .step_mut(index)
            .ok_or(CheckpointError::StepOutOfRange { index, max })?;

        if !step.status.can_transition_to(status) {
            return Err(CheckpointError::InvalidTransition {
                index,
                from: step.status,
                to: status,
            });
        }

        step.status = status;
        step.message = message.to_string();
        step.timestamp = now;
        if data.is_some() {
            step.data = data;
        }

        if status == StepStatus::Completed {
            task.current_step = (index + 1).min(max + 1);
        }
        task.recompute_completed();
        task.updated_at = now;

        self.persist(&task).await?;

        tracing::debug!(
            task_id = %task.id,
            index,
            status = %status,
            current_step = task.current_step,
            "checkpointed step transition"
        );

        Ok(Some(task))
    }

    /// Merge one named output into the current task and persist.
    ///
    /// Returns `Ok(None)` without writing when there is no current task.
    pub async fn set_output(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<TaskRecord>, CheckpointError> {
        let Some(mut task) = self.load_current().await? else {
            tracing::warn!(output = name, "output update with no current task, ignoring");
            return Ok(None);
        };

        task.outputs.insert(name.to_string(), value.to_string());
        task.updated_at = Utc::now();
        self.persist(&task).await?;

        tracing::debug!(task_id = %task.id, output = name, "checkpointed output");
        Ok(Some(task))
    }

    // -----------------------------------------------------------------------
    // Recovery helpers
    // -----------------------------------------------------------------------

    /// Where a resumed run should start, or `None` if there is nothing to resume.
    pub async fn resume_point(&self) -> Result<Option<u32>, CheckpointError> {
        Ok(self.load_current().await?.as_ref().and_then(resume_point_of))
    }

    async fn persist(&self, task: &TaskRecord) -> Result<(), CheckpointError> {
        save_document(&self.store, keys::CURRENT_TASK, task).await?;
        save_document(&self.store, &keys::task(&task.id), task).await?;
        Ok(())
    }
}

/// Resume point of a task record.
///
/// The earliest Failed or Running step wins; otherwise `current_step`, unless
/// it points past the end, in which case the first step not yet Completed.
pub fn resume_point_of(task: &TaskRecord) -> Option<u32> {
    if task.completed {
        return None;
    }
    if let Some(stuck) = task.first_stuck() {
        return Some(stuck);
    }
    if task.current_step > task.step_count() {
        return task.first_incomplete();
    }
    Some(task.current_step)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying store operation failed.
    #[error("checkpoint store error: {0}")]
    Store(#[from] StoreError),

    /// Step index outside 1..=N.
    #[error("step {index} out of range (task has {max} steps)")]
    StepOutOfRange { index: u32, max: u32 },

    /// The requested status change is not allowed.
    #[error("step {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: u32,
        from: StepStatus,
        to: StepStatus,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDocumentStore;
    use std::sync::Arc;

    fn manager() -> CheckpointManager<Arc<MemoryDocumentStore>> {
        CheckpointManager::new(
            Arc::new(MemoryDocumentStore::new()),
            PipelineDefinition::standard(),
        )
    }

    async fn complete_step(mgr: &CheckpointManager<Arc<MemoryDocumentStore>>, index: u32) {
        mgr.transition_step(index, StepStatus::Running, "", None)
            .await
            .unwrap();
        mgr.transition_step(index, StepStatus::Completed, "ok", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_persists_current_and_permanent_copy() {
        let mgr = manager();
        let task = mgr.create(serde_json::json!({"account": "acme"})).await.unwrap();

        let current = mgr.load_current().await.unwrap().unwrap();
        let permanent = mgr.load_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(current, task);
        assert_eq!(permanent, task);
        assert_eq!(current.current_step, 1);
        assert_eq!(mgr.resume_point().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn completed_only_after_every_step_completes() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();

        for index in 1..=5 {
            mgr.transition_step(index, StepStatus::Running, "", None)
                .await
                .unwrap();
            let task = mgr
                .transition_step(index, StepStatus::Completed, "ok", None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(task.current_step, index + 1);
            assert_eq!(task.completed, index == 5);
        }

        assert_eq!(mgr.resume_point().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_step_does_not_advance() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();
        complete_step(&mgr, 1).await;
        let task = mgr
            .transition_step(2, StepStatus::Failed, "bad password", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(task.current_step, 2);
        assert_eq!(task.step(2).unwrap().message, "bad password");
        assert!(!task.completed);
        assert_eq!(mgr.resume_point().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn pending_step_cannot_complete_without_running() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();

        let err = mgr
            .transition_step(1, StepStatus::Completed, "ok", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::InvalidTransition {
                index: 1,
                from: StepStatus::Pending,
                to: StepStatus::Completed,
            }
        ));

        let task = mgr.load_current().await.unwrap().unwrap();
        assert_eq!(task.step(1).unwrap().status, StepStatus::Pending);
        assert_eq!(task.current_step, 1);
    }

    #[tokio::test]
    async fn transition_without_current_task_is_noop() {
        let mgr = manager();
        let result = mgr
            .transition_step(1, StepStatus::Running, "", None)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(mgr.store().is_empty());

        assert!(mgr.set_output("report_path", "/tmp/r").await.unwrap().is_none());
        assert_eq!(mgr.resume_point().await.unwrap(), None);
    }

    #[tokio::test]
    async fn out_of_range_index_rejected() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();

        let err = mgr
            .transition_step(6, StepStatus::Running, "", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::StepOutOfRange { index: 6, max: 5 }
        ));

        let err = mgr
            .transition_step(0, StepStatus::Running, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::StepOutOfRange { index: 0, .. }));
    }

    #[tokio::test]
    async fn stale_writer_cannot_reset_step_to_pending() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();
        mgr.transition_step(1, StepStatus::Failed, "boom", None)
            .await
            .unwrap();

        let err = mgr
            .transition_step(1, StepStatus::Pending, "", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::InvalidTransition {
                from: StepStatus::Failed,
                to: StepStatus::Pending,
                ..
            }
        ));

        // Retry path is allowed.
        mgr.transition_step(1, StepStatus::Running, "retry", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn data_kept_when_none_passed() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();
        mgr.transition_step(1, StepStatus::Running, "", Some(serde_json::json!({"session": 7})))
            .await
            .unwrap();
        let task = mgr
            .transition_step(1, StepStatus::Completed, "done", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.step(1).unwrap().data, Some(serde_json::json!({"session": 7})));
    }

    #[tokio::test]
    async fn resume_point_after_crash_mid_step() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();
        complete_step(&mgr, 1).await;
        mgr.transition_step(2, StepStatus::Running, "", None)
            .await
            .unwrap();

        // Simulate a writer that advanced the pointer past the stuck step.
        let mut task = mgr.load_current().await.unwrap().unwrap();
        task.current_step = 4;
        save_document(mgr.store(), keys::CURRENT_TASK, &task)
            .await
            .unwrap();

        assert_eq!(mgr.resume_point().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn earliest_stuck_step_wins() {
        let mgr = manager();
        mgr.create(Value::Null).await.unwrap();
        complete_step(&mgr, 1).await;
        mgr.transition_step(2, StepStatus::Running, "", None)
            .await
            .unwrap();
        mgr.transition_step(4, StepStatus::Failed, "", None)
            .await
            .unwrap();

        assert_eq!(mgr.resume_point().await.unwrap(), Some(2));
    }

    #[test]
    fn resume_point_past_end_falls_back_to_first_incomplete() {
        let mut task = TaskRecord::new(&PipelineDefinition::standard(), Value::Null);
        for step in task.steps.iter_mut() {
            step.status = StepStatus::Completed;
        }
        task.steps[2].status = StepStatus::Pending;
        task.current_step = 6;
        task.recompute_completed();

        assert_eq!(resume_point_of(&task), Some(3));
    }

    #[tokio::test]
    async fn set_output_merges_and_clear_keeps_permanent_copy() {
        let mgr = manager();
        let task = mgr.create(Value::Null).await.unwrap();

        mgr.set_output("report_path", "/data/report.csv").await.unwrap();
        let updated = mgr
            .set_output("summary_path", "/data/summary.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.outputs.len(), 2);
        assert_eq!(updated.outputs["report_path"], "/data/report.csv");

        assert!(mgr.clear().await.unwrap());
        assert!(!mgr.clear().await.unwrap());
        assert!(mgr.load_current().await.unwrap().is_none());

        let permanent = mgr.load_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(permanent.outputs.len(), 2);
    }

    #[test]
    fn checkpoint_error_display() {
        let err = CheckpointError::InvalidTransition {
            index: 3,
            from: StepStatus::Completed,
            to: StepStatus::Failed,
        };
        assert_eq!(err.to_string(), "step 3 cannot move from completed to failed");
    }
}
