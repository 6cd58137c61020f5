//! Pipeline orchestrator: strictly sequential step execution with durable
//! checkpointing.
//!
//! The `PipelineOrchestrator` walks the fixed step sequence of the current
//! task. Each step is checkpointed before and after execution, so a crashed,
//! failed or cancelled run resumes from `CheckpointManager::resume_point`
//! without redoing completed steps.
//!
//! # Execution flow
//!
//! 1. Create a task (or load the current one for resume).
//! 2. For each step in order:
//!    - already Completed: notify with the prior message, do not execute;
//!    - cancellation requested: stop, leaving the step untouched;
//!    - a required output is missing: record Failed, stop;
//!    - otherwise record Running, execute, write outputs, record the result.
//! 3. A failed step stops the run and keeps the checkpoint.
//! 4. When every step is Completed, clear the checkpoint and emit the
//!    terminal event.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;
use waypoint_types::event::{EventScope, ProgressEvent};
use waypoint_types::pipeline::PipelineError;
use waypoint_types::task::{StepStatus, TaskRecord};

use crate::event::EventBus;
use crate::storage::DocumentStore;

use super::cancel::CancelSignal;
use super::checkpoint::{resume_point_of, CheckpointError, CheckpointManager};
use super::queue::QueueError;
use super::step_runner::{StepExecutor, StepInputs, StepResult};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a step was handled in a run.
///
/// Both variants go through the same notification path.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Already Completed from an earlier run; carries the recorded message.
    Skipped(String),
    /// Executed in this run.
    Executed(StepResult),
}

impl StepOutcome {
    fn status_and_message(&self) -> (StepStatus, &str) {
        match self {
            StepOutcome::Skipped(prior) => (StepStatus::Completed, prior.as_str()),
            StepOutcome::Executed(result) if result.success => {
                (StepStatus::Completed, result.message.as_str())
            }
            StepOutcome::Executed(result) => (StepStatus::Failed, result.message.as_str()),
        }
    }
}

/// Terminal result of a pipeline run.
///
/// Failures, missing dependencies and cancellation are outcomes, not errors:
/// each leaves a resumable checkpoint behind.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Every step Completed; the checkpoint has been cleared.
    Completed {
        task_id: Uuid,
        outputs: BTreeMap<String, String>,
        executed: u32,
        skipped: u32,
    },
    /// The executor reported failure for `step`.
    Failed {
        task_id: Uuid,
        step: u32,
        message: String,
    },
    /// `step` was not attempted because `output` did not exist yet.
    MissingDependency {
        task_id: Uuid,
        step: u32,
        output: String,
    },
    /// Cancellation was observed before `step` started.
    Cancelled { task_id: Uuid, step: u32 },
}

impl PipelineOutcome {
    pub fn task_id(&self) -> Uuid {
        match self {
            PipelineOutcome::Completed { task_id, .. }
            | PipelineOutcome::Failed { task_id, .. }
            | PipelineOutcome::MissingDependency { task_id, .. }
            | PipelineOutcome::Cancelled { task_id, .. } => *task_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    /// Lowercase name used for the terminal event.
    pub fn status_name(&self) -> &'static str {
        match self {
            PipelineOutcome::Completed { .. } => "completed",
            PipelineOutcome::Failed { .. } | PipelineOutcome::MissingDependency { .. } => {
                "failed"
            }
            PipelineOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Sequential step runner with durable checkpointing.
///
/// Generic over `S: DocumentStore` for storage and `E: StepExecutor` for the
/// work itself.
pub struct PipelineOrchestrator<S: DocumentStore, E: StepExecutor> {
    checkpoint: CheckpointManager<S>,
    executor: E,
    event_bus: EventBus,
    cancel: Arc<CancelSignal>,
}

impl<S: DocumentStore, E: StepExecutor> PipelineOrchestrator<S, E> {
    pub fn new(
        checkpoint: CheckpointManager<S>,
        executor: E,
        event_bus: EventBus,
        cancel: Arc<CancelSignal>,
    ) -> Self {
        Self {
            checkpoint,
            executor,
            event_bus,
            cancel,
        }
    }

    pub fn checkpoint(&self) -> &CheckpointManager<S> {
        &self.checkpoint
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// The pipeline-scope cancellation signal.
    pub fn cancel_signal(&self) -> &Arc<CancelSignal> {
        &self.cancel
    }

    /// Start a fresh task from step 1.
    pub async fn start(&self, payload: serde_json::Value) -> Result<PipelineOutcome, ExecutorError> {
        self.cancel.reset();
        self.checkpoint.pipeline().validate()?;

        let task = self.checkpoint.create(payload).await?;

        tracing::info!(
            task_id = %task.id,
            pipeline = self.checkpoint.pipeline().name.as_str(),
            "starting pipeline run"
        );

        self.run_task(task, 1).await
    }

    /// Resume the current task from where it stopped.
    pub async fn resume(&self) -> Result<PipelineOutcome, ExecutorError> {
        self.cancel.reset();

        let task = self
            .checkpoint
            .load_current()
            .await?
            .ok_or(ExecutorError::NoCheckpoint)?;
        self.check_task_shape(&task)?;

        let past_end = task.step_count() + 1;
        let start = match (resume_point_of(&task), task.first_incomplete()) {
            (Some(point), Some(incomplete)) => point.min(incomplete),
            (point, incomplete) => point.or(incomplete).unwrap_or(past_end),
        };

        tracing::info!(
            task_id = %task.id,
            start,
            completed = task.completed_count(),
            "resuming pipeline run"
        );

        self.run_task(task, start).await
    }

    /// Run the current task from `start`.
    ///
    /// Every step before `start` must already be Completed; those are
    /// replayed as skipped notifications.
    pub async fn run_from(&self, start: u32) -> Result<PipelineOutcome, ExecutorError> {
        let task = self
            .checkpoint
            .load_current()
            .await?
            .ok_or(ExecutorError::NoCheckpoint)?;
        self.check_task_shape(&task)?;

        let first_incomplete = task.first_incomplete().unwrap_or(task.step_count() + 1);
        if start == 0 || start > first_incomplete {
            return Err(ExecutorError::InvalidStart {
                start,
                first_incomplete,
            });
        }

        self.run_task(task, start).await
    }

    fn check_task_shape(&self, task: &TaskRecord) -> Result<(), ExecutorError> {
        let pipeline_steps = self.checkpoint.pipeline().len();
        if task.step_count() != pipeline_steps {
            return Err(ExecutorError::PipelineMismatch {
                task_steps: task.step_count(),
                pipeline_steps,
            });
        }
        Ok(())
    }

    async fn run_task(
        &self,
        mut task: TaskRecord,
        start: u32,
    ) -> Result<PipelineOutcome, ExecutorError> {
        let task_id = task.id;
        let total = task.step_count();
        let mut executed = 0;
        let mut skipped = self.replay_completed(&task, start)?;

        tracing::debug!(task_id = %task_id, start, total, skipped, "walking pipeline steps");

        for index in start..=total {
            let spec = self
                .checkpoint
                .pipeline()
                .step(index)
                .cloned()
                .ok_or(ExecutorError::PipelineMismatch {
                    task_steps: total,
                    pipeline_steps: self.checkpoint.pipeline().len(),
                })?;

            let Some(record) = task.step(index) else {
                return Err(CheckpointError::StepOutOfRange { index, max: total }.into());
            };

            if record.status == StepStatus::Completed {
                tracing::debug!(task_id = %task_id, index, "skipping completed step");
                self.notify_step(index, &StepOutcome::Skipped(record.message.clone()));
                skipped += 1;
                continue;
            }

            if self.cancel.is_cancelled() {
                tracing::info!(task_id = %task_id, index, "pipeline run cancelled");
                return Ok(self.finish(PipelineOutcome::Cancelled {
                    task_id,
                    step: index,
                }));
            }

            if let Some(missing) = spec
                .requires
                .iter()
                .find(|name| !task.outputs.contains_key(name.as_str()))
            {
                let message = format!("missing dependency: output '{missing}' is not available");
                self.record(index, StepStatus::Failed, &message, None).await?;
                self.notify_step(index, &StepOutcome::Executed(StepResult::failed(&message)));

                tracing::warn!(
                    task_id = %task_id,
                    index,
                    output = missing.as_str(),
                    "step blocked by missing dependency"
                );
                return Ok(self.finish(PipelineOutcome::MissingDependency {
                    task_id,
                    step: index,
                    output: missing.clone(),
                }));
            }

            task = self.record(index, StepStatus::Running, "started", None).await?;
            tracing::debug!(task_id = %task_id, index, step = spec.name.as_str(), "running step");

            let inputs = StepInputs {
                task_id,
                step: spec,
                payload: task.payload.clone(),
                outputs: task.outputs.clone(),
            };
            let result = self.executor.execute(&inputs).await;

            for (name, value) in &result.outputs {
                self.checkpoint.set_output(name, value).await?;
            }

            let status = if result.success {
                StepStatus::Completed
            } else {
                StepStatus::Failed
            };
            task = self
                .record(index, status, &result.message, result.data.clone())
                .await?;

            let message = result.message.clone();
            let success = result.success;
            self.notify_step(index, &StepOutcome::Executed(result));

            if !success {
                tracing::warn!(task_id = %task_id, index, message = message.as_str(), "step failed");
                return Ok(self.finish(PipelineOutcome::Failed {
                    task_id,
                    step: index,
                    message,
                }));
            }
            executed += 1;
        }

        self.checkpoint.clear().await?;

        tracing::info!(task_id = %task_id, executed, skipped, "pipeline run completed");

        Ok(self.finish(PipelineOutcome::Completed {
            task_id,
            outputs: task.outputs,
            executed,
            skipped,
        }))
    }

    /// Notify every step before `start` as skipped. Each one must already be
    /// Completed. Returns how many were replayed.
    fn replay_completed(&self, task: &TaskRecord, start: u32) -> Result<u32, ExecutorError> {
        let mut replayed = 0;
        for index in 1..start {
            let Some(record) = task.step(index) else {
                return Err(CheckpointError::StepOutOfRange {
                    index,
                    max: task.step_count(),
                }
                .into());
            };
            if record.status != StepStatus::Completed {
                return Err(ExecutorError::InvalidStart {
                    start,
                    first_incomplete: index,
                });
            }
            tracing::debug!(task_id = %task.id, index, "replaying completed step");
            self.notify_step(index, &StepOutcome::Skipped(record.message.clone()));
            replayed += 1;
        }
        Ok(replayed)
    }

    /// Persist a step transition, failing if the task vanished mid-run.
    async fn record(
        &self,
        index: u32,
        status: StepStatus,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> Result<TaskRecord, ExecutorError> {
        self.checkpoint
            .transition_step(index, status, message, data)
            .await?
            .ok_or(ExecutorError::NoCheckpoint)
    }

    fn notify_step(&self, index: u32, outcome: &StepOutcome) {
        let (status, message) = outcome.status_and_message();
        self.event_bus
            .publish(ProgressEvent::step(index, status, message));
    }

    fn finish(&self, outcome: PipelineOutcome) -> PipelineOutcome {
        let message = match &outcome {
            PipelineOutcome::Completed { .. } => "all steps completed".to_string(),
            PipelineOutcome::Failed { step, message, .. } => format!("step {step} failed: {message}"),
            PipelineOutcome::MissingDependency { step, output, .. } => {
                format!("step {step} is missing output '{output}'")
            }
            PipelineOutcome::Cancelled { step, .. } => format!("cancelled before step {step}"),
        };
        self.event_bus.publish(ProgressEvent::new(
            EventScope::Pipeline,
            outcome.task_id().to_string(),
            outcome.status_name(),
            message,
        ));
        outcome
    }
}

// ---------------------------------------------------------------------------
// ExecutorError
// ---------------------------------------------------------------------------

/// Errors that stop an orchestrator run outright.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Checkpoint persistence error.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Queue persistence error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Nothing to resume.
    #[error("no current task checkpoint")]
    NoCheckpoint,

    /// `run_from` asked to start past a step that is not Completed.
    #[error("cannot start at step {start}: step {first_incomplete} is not completed")]
    InvalidStart { start: u32, first_incomplete: u32 },

    /// The configured pipeline is malformed.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(#[from] PipelineError),

    /// The stored task was created for a different pipeline.
    #[error("task has {task_steps} steps but the pipeline defines {pipeline_steps}")]
    PipelineMismatch { task_steps: u32, pipeline_steps: u32 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
