//! Error types for command execution.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the command execution primitive.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The argument vector was empty.
    #[error("Command has no program to execute")]
    EmptyCommand,

    /// The executable could not be started (missing, not executable, bad cwd).
    #[error("Failed to spawn command '{program}': {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully. Only raised when the caller
    /// asked for the exit status to be checked.
    #[error("Command '{command}' exited with {}", describe_code(.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The command did not finish before its deadline and was killed.
    #[error("Command '{command}' timed out after {}s", .after.as_secs_f64())]
    Timeout { command: String, after: Duration },

    /// The caller stopped the command before it finished.
    #[error("Command '{command}' was interrupted")]
    Interrupted { command: String },

    /// Waiting on the spawned process failed.
    #[error("Failed to wait on command '{command}': {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Type alias for Result with ExecError.
pub type ExecResult<T> = Result<T, ExecError>;
