//! Command execution primitive.
//!
//! Two entry points share the same command construction:
//! - [`spawn`] starts a process and hands back its handle without waiting
//!   (used by the supervisor for long-running services)
//! - [`run`] starts a process and waits for it to finish, optionally
//!   capturing output and enforcing a deadline; [`run_until`] can also be
//!   cut short by the caller (used by the pipeline engine)
//!
//! Every invocation creates exactly one OS process. [`run`] always reaps the
//! process it created; callers of [`spawn`] own the returned [`Child`] and
//! are responsible for waiting on it.

pub mod error;
pub mod signal;

pub use error::{ExecError, ExecResult};

use dr_protocol::command_models::CommandSpec;
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long an interrupted command's process group gets to exit after
/// SIGTERM before it is killed.
pub const STOP_GRACE: Duration = Duration::from_secs(3);

/// Where a spawned command's stdout and stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the caller's terminal.
    Inherit,
    /// Pipe both streams back to the caller.
    Capture,
}

impl OutputMode {
    fn stdio(self) -> Stdio {
        match self {
            OutputMode::Inherit => Stdio::inherit(),
            OutputMode::Capture => Stdio::piped(),
        }
    }
}

/// Options for [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Treat a non-zero exit as [`ExecError::NonZeroExit`].
    pub check: bool,
    pub output: OutputMode,
    /// Kill the command if it has not finished within this duration.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check: true,
            output: OutputMode::Capture,
            timeout: None,
        }
    }
}

impl RunOptions {
    /// Capture output and never fail on the exit code.
    pub fn unchecked() -> Self {
        Self {
            check: false,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

/// Structured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, absent when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Build a [`Command`] from a descriptor.
///
/// stdin is always closed: supervised children live in their own process
/// group and must not compete with devrun for the terminal.
pub fn build_command(spec: &CommandSpec, output: OutputMode) -> ExecResult<Command> {
    let program = spec.program().ok_or(ExecError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(spec.args());
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&spec.env);
    cmd.stdin(Stdio::null());
    cmd.stdout(output.stdio());
    cmd.stderr(output.stdio());
    cmd.kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    Ok(cmd)
}

/// Spawn a command without waiting for it.
///
/// The caller owns the returned child and must reap it.
pub fn spawn(spec: &CommandSpec, output: OutputMode) -> ExecResult<Child> {
    let mut cmd = build_command(spec, output)?;
    cmd.spawn().map_err(|source| ExecError::SpawnFailed {
        program: spec.program().unwrap_or_default().to_string(),
        source,
    })
}

/// Run a command to completion.
///
/// # Errors
///
/// - [`ExecError::SpawnFailed`] if the program cannot be started
/// - [`ExecError::NonZeroExit`] if `options.check` is set and the exit code
///   is not zero
/// - [`ExecError::Timeout`] if `options.timeout` elapses first; the process
///   group is killed and reaped before returning
pub async fn run(spec: &CommandSpec, options: &RunOptions) -> ExecResult<CommandOutput> {
    run_until(spec, options, std::future::pending::<()>()).await
}

/// Like [`run`], but stop the command as soon as `cancel` completes.
///
/// A cancelled command's process group is asked to terminate, given
/// [`STOP_GRACE`] to exit, then killed. It is always reaped before
/// [`ExecError::Interrupted`] is returned.
pub async fn run_until<F>(spec: &CommandSpec, options: &RunOptions, cancel: F) -> ExecResult<CommandOutput>
where
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let mut child = spawn(spec, options.output)?;
    let command = spec.to_string();

    tracing::debug!(command = %command, pid = ?child.id(), "spawned command");

    let stdout_task = child.stdout.take().map(|stream| tokio::spawn(read_lossy(stream)));
    let stderr_task = child.stderr.take().map(|stream| tokio::spawn(read_lossy(stream)));

    let deadline = async {
        match options.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    let ended = tokio::select! {
        waited = child.wait() => Ended::Exited(waited),
        _ = deadline => Ended::TimedOut,
        _ = cancel => Ended::Cancelled,
    };

    let waited = match ended {
        Ended::Exited(waited) => waited,
        Ended::TimedOut => {
            if let Err(e) = signal::kill_and_reap(&mut child).await {
                tracing::warn!(command = %command, error = %e, "failed to reap timed out command");
            }
            return Err(ExecError::Timeout {
                command,
                after: options.timeout.unwrap_or_default(),
            });
        }
        Ended::Cancelled => {
            tracing::info!(command = %command, "stopping interrupted command");
            if let Err(e) = signal::terminate_and_reap(&mut child, STOP_GRACE).await {
                tracing::warn!(command = %command, error = %e, "failed to reap interrupted command");
            }
            return Err(ExecError::Interrupted { command });
        }
    };

    let status = waited.map_err(|source| ExecError::Wait {
        command: command.clone(),
        source,
    })?;

    let output = CommandOutput {
        exit_code: status.code(),
        stdout: join_output(stdout_task).await,
        stderr: join_output(stderr_task).await,
        duration: started.elapsed(),
    };

    if options.check && !status.success() {
        return Err(ExecError::NonZeroExit {
            command,
            code: output.exit_code,
            stderr: output.stderr,
        });
    }

    Ok(output)
}

enum Ended {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

async fn read_lossy<R: AsyncRead + Unpin>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_output(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// Last non-empty line of some command output, for compact failure messages.
pub fn last_line(output: &str) -> Option<&str> {
    output.lines().rev().map(str::trim).find(|line| !line.is_empty())
}
