//! Pipeline configuration models for `.devrun/pipelines/*.yaml`.
//!
//! This module defines pipeline definition files and the aggregate result of
//! one pipeline execution.

use crate::command_models::CommandSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

fn default_required() -> bool {
    true
}

/// A named, ordered unit of a pipeline.
///
/// Steps are required unless stated otherwise. A failing optional step is
/// recorded but does not stop the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StepSpec {
    /// Step name shown in progress output and summaries.
    pub name: String,

    /// Command executed for this step.
    #[serde(flatten)]
    pub command: CommandSpec,

    /// Whether a failure of this step aborts the pipeline.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Optional deadline for the step, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Only run the step when this path exists, relative to the step's
    /// working directory. The step is skipped otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_exists: Option<PathBuf>,
}

impl StepSpec {
    /// Create a required step.
    pub fn required(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            required: true,
            timeout_secs: None,
            if_exists: None,
        }
    }

    /// Create an optional step.
    pub fn optional(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            required: false,
            ..Self::required(name, command)
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn only_if_exists(mut self, path: impl Into<PathBuf>) -> Self {
        self.if_exists = Some(path.into());
        self
    }
}

/// Defines a full pipeline.
///
/// # Example
///
/// ```yaml
/// name: build
/// steps:
///   - name: install
///     command: ["npm", "install"]
///   - name: lint
///     command: ["npm", "run", "lint"]
///   - name: install-python
///     command: ["pip", "install", "-r", "requirements.txt"]
///     required: false
///     if-exists: requirements.txt
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Pipeline {
    /// Unique name identifying this pipeline.
    pub name: String,

    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// Outcome of a single pipeline step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    /// The step was never started.
    NotRun,

    /// The step's precondition did not hold, so it was not started.
    Skipped { reason: String },

    /// The step's command exited with code 0.
    Success,

    /// The step's command could not run or exited unsuccessfully.
    Failure { message: String },

    /// The run was interrupted while this step was executing.
    Interrupted,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failure { .. })
    }

    /// Whether the step's command was started.
    pub fn was_executed(&self) -> bool {
        matches!(
            self,
            StepOutcome::Success | StepOutcome::Failure { .. } | StepOutcome::Interrupted
        )
    }
}

/// Recorded result of a step within a [`PipelineRun`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub name: String,
    pub required: bool,
    pub outcome: StepOutcome,

    /// Exit code of the step's command, when it ran to completion.
    pub exit_code: Option<i32>,

    /// Wall-clock time spent on the step, in milliseconds.
    pub duration_ms: u64,
}

impl StepResult {
    /// A result for a step that was never started.
    pub fn not_run(step: &StepSpec) -> Self {
        Self {
            name: step.name.clone(),
            required: step.required,
            outcome: StepOutcome::NotRun,
            exit_code: None,
            duration_ms: 0,
        }
    }
}

/// The aggregate result of one pipeline execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// Unique identifier for this run.
    pub id: Uuid,

    pub pipeline_name: String,

    /// Step results in declared order, including steps that never ran.
    pub steps: Vec<StepResult>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// True iff every required step succeeded.
    pub success: bool,
}

impl PipelineRun {
    /// Elapsed wall-clock time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Number of steps that were started.
    pub fn executed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.was_executed()).count()
    }

    /// The step that was running when the run was interrupted, as a 1-based
    /// position and the step.
    pub fn interrupted_at(&self) -> Option<(usize, &StepResult)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.outcome == StepOutcome::Interrupted)
            .map(|(i, s)| (i + 1, s))
    }

    /// The first required step that failed, as a 1-based position and the step.
    pub fn blocking_failure(&self) -> Option<(usize, &StepResult)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.required && s.outcome.is_failure())
            .map(|(i, s)| (i + 1, s))
    }

    /// Names of optional steps that failed.
    pub fn optional_failures(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !s.required && s.outcome.is_failure())
            .map(|s| s.name.as_str())
            .collect()
    }
}

impl fmt::Display for PipelineRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed_ms() as f64 / 1000.0;
        if let Some((position, step)) = self.interrupted_at() {
            return write!(
                f,
                "pipeline {} interrupted at step {} of {} ({}) after {:.2}s",
                self.pipeline_name,
                position,
                self.steps.len(),
                step.name,
                secs
            );
        }
        match self.blocking_failure() {
            Some((position, step)) => write!(
                f,
                "pipeline {} aborted at step {} of {} ({}) after {:.2}s",
                self.pipeline_name,
                position,
                self.steps.len(),
                step.name,
                secs
            ),
            None => write!(
                f,
                "pipeline {} completed {} step(s) in {:.2}s",
                self.pipeline_name,
                self.executed_count(),
                secs
            ),
        }
    }
}
