//! Supervised process models.
//!
//! This module defines the definition of a long-running service
//! (`.devrun/services/*.yaml`), the lifecycle states a supervised process
//! moves through, and the summarized reason a supervision session ended.

use crate::command_models::CommandSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines a long-running process the supervisor starts and watches.
///
/// # Example
///
/// ```yaml
/// name: backend
/// command: ["uvicorn", "api-server:app", "--port", "8000", "--reload"]
/// health-url: "http://localhost:8000/api/health"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ProcessSpec {
    /// Unique name identifying this process within a session.
    pub name: String,

    /// Command used to start the process.
    #[serde(flatten)]
    pub command: CommandSpec,

    /// Endpoint queried by `devrun status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            health_url: None,
        }
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }
}

/// Lifecycle state of a supervised process.
///
/// ```text
/// Pending -> Running -> Stopping -> Exited
///                    \-> Exited
///                    \-> Failed
/// Pending -> Failed            (spawn failure)
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Configured but not spawned yet.
    Pending,

    /// Spawned and not yet reported as finished.
    Running,

    /// A termination request has been delivered.
    Stopping,

    /// The OS reported completion. `code` is absent when the process was
    /// ended by a signal.
    Exited { code: Option<i32> },

    /// The process could not be spawned or waited on.
    Failed { error: String },
}

impl ProcessState {
    /// Whether the process has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exited { .. } | ProcessState::Failed { .. })
    }

    /// Whether the process is alive from the supervisor's point of view.
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Stopping)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Pending => write!(f, "pending"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Exited { code: Some(code) } => write!(f, "exited ({code})"),
            ProcessState::Exited { code: None } => write!(f, "exited (signal)"),
            ProcessState::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Point-in-time view of a supervised process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub name: String,
    pub pid: Option<u32>,
    pub state: ProcessState,
}

/// Interrupt signals the supervisor reacts to. Both are handled the same way.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for InterruptSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptSignal::Interrupt => write!(f, "SIGINT"),
            InterruptSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Why a supervision session ended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShutdownReason {
    /// The operator sent an interrupt signal.
    Interrupted { signal: InterruptSignal },

    /// A programmatic shutdown request arrived on the control channel.
    Requested,

    /// A process finished on its own with exit code 0.
    ProcessCompleted { name: String },

    /// A process terminated with a non-zero code or by a signal while the
    /// session was not shutting down.
    UnexpectedExit { name: String, code: Option<i32> },

    /// A process could not be started.
    SpawnFailed { name: String, error: String },

    /// A process could not be waited on after it was started.
    ProcessFailed { name: String, error: String },

    /// The session had nothing left to supervise.
    NoProcesses,
}

impl ShutdownReason {
    /// Whether this reason counts as a clean shutdown for exit code purposes.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            ShutdownReason::Interrupted { .. }
                | ShutdownReason::Requested
                | ShutdownReason::ProcessCompleted { .. }
                | ShutdownReason::NoProcesses
        )
    }

    /// Process exit code the CLI should return for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupted { signal } => {
                write!(f, "stopped cleanly by request ({signal})")
            }
            ShutdownReason::Requested => write!(f, "stopped cleanly by request"),
            ShutdownReason::ProcessCompleted { name } => {
                write!(f, "stopped because {name} finished")
            }
            ShutdownReason::UnexpectedExit {
                name,
                code: Some(code),
            } => write!(f, "stopped because {name} crashed (exit code {code})"),
            ShutdownReason::UnexpectedExit { name, code: None } => {
                write!(f, "stopped because {name} crashed (killed by signal)")
            }
            ShutdownReason::SpawnFailed { name, error } => {
                write!(f, "stopped because {name} failed to start: {error}")
            }
            ShutdownReason::ProcessFailed { name, error } => {
                write!(f, "stopped because {name} failed: {error}")
            }
            ShutdownReason::NoProcesses => write!(f, "nothing to supervise"),
        }
    }
}
