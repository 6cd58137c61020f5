//! Orchestration core: checkpointing, work queues, and the run loops.
//!
//! - `checkpoint` -- durable per-step state of the current task
//! - `queue` -- work queue documents and the optimistic item status update
//! - `reducer` -- pure item mutation, progress and aggregate status
//! - `cancel` -- resettable cooperative cancellation signals
//! - `step_runner` -- executor contracts for steps and items
//! - `executor` -- sequential pipeline orchestrator
//! - `queue_runner` -- bulk queue iteration

pub mod cancel;
pub mod checkpoint;
pub mod executor;
pub mod queue;
pub mod queue_runner;
pub mod reducer;
pub mod step_runner;
