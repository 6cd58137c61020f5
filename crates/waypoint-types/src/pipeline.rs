//! Pipeline definition: the fixed, ordered step sequence a task walks.
//!
//! Each `StepSpec` names the outputs it needs before it may start and the
//! outputs it writes. The orchestrator uses `requires` for its
//! missing-dependency pre-check.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One fixed pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// 1-based position in the pipeline.
    pub index: u32,
    /// Machine name (e.g. "export_report").
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Output keys that must exist before this step may start.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Output keys this step is expected to write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
}

impl StepSpec {
    pub fn new(index: u32, name: &str, description: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            description: description.to_string(),
            requires: Vec::new(),
            produces: Vec::new(),
        }
    }

    pub fn requires(mut self, key: &str) -> Self {
        self.requires.push(key.to_string());
        self
    }

    pub fn produces(mut self, key: &str) -> Self {
        self.produces.push(key.to_string());
        self
    }
}

/// The ordered step sequence for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub steps: Vec<StepSpec>,
}

impl PipelineDefinition {
    /// The standard five-step pipeline: two logins, a collection pass, and
    /// two derived artifacts where the second consumes the first.
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            steps: vec![
                StepSpec::new(1, "primary_login", "Sign in to the primary system"),
                StepSpec::new(2, "secondary_login", "Sign in to the secondary system"),
                StepSpec::new(3, "collect_records", "Collect records from both systems"),
                StepSpec::new(4, "export_report", "Export the collected records as a report")
                    .produces("report_path"),
                StepSpec::new(5, "publish_summary", "Build and publish a summary of the report")
                    .requires("report_path")
                    .produces("summary_path"),
            ],
        }
    }

    /// Number of steps (N).
    pub fn len(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step spec by 1-based index.
    pub fn step(&self, index: u32) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.index == index)
    }

    /// Check structural validity.
    ///
    /// Indices must run 1..=N in order, names must be unique, and every
    /// required output must be produced by an earlier step.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.steps.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut names = HashSet::new();
        let mut produced: HashSet<&str> = HashSet::new();

        for (position, step) in self.steps.iter().enumerate() {
            let expected = position as u32 + 1;
            if step.index != expected {
                return Err(PipelineError::BadIndex {
                    expected,
                    found: step.index,
                });
            }
            if !names.insert(step.name.as_str()) {
                return Err(PipelineError::DuplicateName(step.name.clone()));
            }
            for key in &step.requires {
                if !produced.contains(key.as_str()) {
                    return Err(PipelineError::UnproducedRequirement {
                        step: step.name.clone(),
                        output: key.clone(),
                    });
                }
            }
            produced.extend(step.produces.iter().map(String::as_str));
        }

        Ok(())
    }
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

/// Structural problems in a pipeline definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline has no steps")]
    Empty,

    #[error("step index out of order: expected {expected}, found {found}")]
    BadIndex { expected: u32, found: u32 },

    #[error("duplicate step name '{0}'")]
    DuplicateName(String),

    #[error("step '{step}' requires output '{output}' which no earlier step produces")]
    UnproducedRequirement { step: String, output: String },
}
