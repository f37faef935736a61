//! Process supervisor.
//!
//! The [`Supervisor`] owns the [`ManagedProcess`] set for one session. It
//! starts every process, blocks in [`Supervisor::wait_any`] until the first
//! process ends or a control request arrives, and tears the session down
//! with a bounded [`Supervisor::shutdown`].
//!
//! Each child is watched by its own monitor task. Monitors report exits
//! through a single channel that the supervisor drains from its control
//! loop, so process state is only ever mutated in one place.

pub mod interrupt;
pub mod process;

use crate::exec::{self, signal, OutputMode};
use dr_protocol::config_models::GlobalConfig;
use dr_protocol::ipc::{Event, Op, OutputStream};
use dr_protocol::process_models::{ProcessSnapshot, ProcessSpec, ProcessState, ShutdownReason};
use process::{create_process, mark_exited, mark_failed, mark_running, mark_stopping, ManagedProcess, ProcessHandle};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// How often a shutdown re-checks process groups whose leader already exited.
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tunables for a supervision session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Graceful shutdown bound before children are killed.
    pub shutdown_timeout: Duration,

    /// Interrupts received during a shutdown that trigger an immediate
    /// kill. Zero disables escalation.
    pub force_kill_after_interrupts: u32,

    /// Relay child output as [`Event::ProcessOutput`] instead of inheriting
    /// the terminal.
    pub prefix_output: bool,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for SupervisorOptions {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            force_kill_after_interrupts: config.force_kill_after_interrupts,
            prefix_output: config.prefix_output,
        }
    }
}

/// Where the supervisor is in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Configured,
    Supervising,
    ShuttingDown,
    Finished,
}

/// What woke [`Supervisor::wait_any`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// A managed process reached a terminal state.
    Exited { name: String, state: ProcessState },

    /// A control request arrived.
    Control(Op),

    /// No process is alive, so there is nothing to wait for.
    Idle,
}

impl Wake {
    /// Map a wake-up to the reason the session should end.
    pub fn into_reason(self) -> ShutdownReason {
        match self {
            Wake::Exited {
                name,
                state: ProcessState::Exited { code: Some(0) },
            } => ShutdownReason::ProcessCompleted { name },
            Wake::Exited {
                name,
                state: ProcessState::Failed { error },
            } => ShutdownReason::ProcessFailed { name, error },
            Wake::Exited { name, state } => ShutdownReason::UnexpectedExit {
                name,
                code: match state {
                    ProcessState::Exited { code } => code,
                    _ => None,
                },
            },
            Wake::Control(Op::Interrupt { signal }) => ShutdownReason::Interrupted { signal },
            Wake::Control(Op::Shutdown) => ShutdownReason::Requested,
            Wake::Idle => ShutdownReason::NoProcesses,
        }
    }
}

/// Summary of a completed [`Supervisor::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Processes that ignored the graceful request and were killed.
    pub forced: Vec<String>,

    /// Interrupts received while the shutdown was in progress.
    pub repeated_interrupts: u32,

    pub elapsed: Duration,
}

/// Exit report sent by a monitor task.
#[derive(Debug)]
struct ExitNotice {
    index: usize,
    result: std::io::Result<ExitStatus>,
}

/// Owns and supervises the processes of one session.
pub struct Supervisor {
    processes: Vec<ManagedProcess>,
    options: SupervisorOptions,
    phase: SessionPhase,
    events_tx: mpsc::Sender<Event>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
    exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
}

impl Supervisor {
    /// Create a supervisor for the given processes, all in Pending state.
    pub fn new(
        specs: Vec<ProcessSpec>,
        options: SupervisorOptions,
        events_tx: mpsc::Sender<Event>,
    ) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            processes: specs.into_iter().map(create_process).collect(),
            options,
            phase: SessionPhase::Configured,
            events_tx,
            exit_tx,
            exit_rx,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn processes(&self) -> &[ManagedProcess] {
        &self.processes
    }

    pub fn snapshot(&self) -> Vec<ProcessSnapshot> {
        self.processes.iter().map(ManagedProcess::snapshot).collect()
    }

    /// Whether any process is still Running or Stopping.
    pub fn has_active(&self) -> bool {
        self.processes.iter().any(|p| p.state.is_active())
    }

    /// Spawn every Pending process.
    ///
    /// A spawn failure does not stop the remaining processes from being
    /// attempted. The first failure is returned so the caller can shut down
    /// whatever did start.
    pub async fn start_all(&mut self) -> Option<ShutdownReason> {
        self.phase = SessionPhase::Supervising;
        let mut first_failure = None;

        for index in 0..self.processes.len() {
            if self.processes[index].state != ProcessState::Pending {
                continue;
            }

            if let Err(error) = self.spawn_one(index).await {
                let name = self.processes[index].name().to_string();
                warn!(process = %name, error = %error, "failed to start process");
                mark_failed(&mut self.processes[index], error.clone(), &self.events_tx).await;
                if first_failure.is_none() {
                    first_failure = Some(ShutdownReason::SpawnFailed { name, error });
                }
            }
        }

        first_failure
    }

    async fn spawn_one(&mut self, index: usize) -> Result<(), String> {
        let output = if self.options.prefix_output {
            OutputMode::Capture
        } else {
            OutputMode::Inherit
        };

        let process = &mut self.processes[index];
        let mut child = exec::spawn(&process.spec.command, output).map_err(|e| e.to_string())?;
        let pid = child.id();

        if self.options.prefix_output {
            let name = process.spec.name.clone();
            if let Some(stdout) = child.stdout.take() {
                relay_lines(stdout, name.clone(), OutputStream::Stdout, self.events_tx.clone());
            }
            if let Some(stderr) = child.stderr.take() {
                relay_lines(stderr, name, OutputStream::Stderr, self.events_tx.clone());
            }
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_child(index, child, kill_rx, self.exit_tx.clone()));

        info!(process = %process.spec.name, pid = ?pid, command = %process.spec.command, "started process");
        let handle = ProcessHandle {
            pid,
            kill_tx: Some(kill_tx),
            monitor,
        };
        mark_running(process, handle, &self.events_tx).await;
        Ok(())
    }

    /// Block until the first managed process terminates or a control
    /// request arrives, whichever comes first.
    ///
    /// Returns [`Wake::Idle`] immediately when nothing is alive. A closed
    /// control channel only disables that source; process exits still wake
    /// the supervisor.
    pub async fn wait_any(&mut self, control: &mut mpsc::Receiver<Op>) -> Wake {
        let mut control_open = true;

        loop {
            if !self.has_active() {
                return Wake::Idle;
            }

            tokio::select! {
                Some(notice) = self.exit_rx.recv() => {
                    if let Some(wake) = self.record_exit(notice).await {
                        return wake;
                    }
                }
                op = control.recv(), if control_open => match op {
                    Some(op) => {
                        debug!(?op, "control request received");
                        return Wake::Control(op);
                    }
                    None => control_open = false,
                },
            }
        }
    }

    /// Stop every live process.
    ///
    /// Running processes get a graceful termination request and are moved to
    /// Stopping. The shutdown then waits for every process, and for every
    /// member of their process groups, to exit. Anything still alive after
    /// `timeout` is killed, as is everything once the configured number of
    /// repeated interrupts arrives. Before returning, every process group the
    /// session started is killed, so nothing outlives the supervisor. Calling
    /// this on a supervisor with nothing left alive is a no-op.
    pub async fn shutdown(
        &mut self,
        timeout: Duration,
        control: &mut mpsc::Receiver<Op>,
    ) -> ShutdownReport {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = ShutdownReport::default();

        if !self.has_active() && !self.has_lingering_group() {
            self.phase = SessionPhase::Finished;
            report.elapsed = started.elapsed();
            return report;
        }

        self.phase = SessionPhase::ShuttingDown;
        self.request_stop_all().await;

        let mut forced = false;
        let mut control_open = true;

        loop {
            let active = self.has_active();
            if !active && (forced || !self.has_lingering_group()) {
                break;
            }

            tokio::select! {
                Some(notice) = self.exit_rx.recv() => {
                    self.record_exit(notice).await;
                }
                _ = tokio::time::sleep(GROUP_POLL_INTERVAL), if !active => {}
                _ = tokio::time::sleep_until(deadline), if !forced => {
                    warn!(timeout_secs = timeout.as_secs_f64(), "graceful shutdown timed out, killing remaining processes");
                    report.forced.extend(self.force_kill_remaining().await);
                    forced = true;
                }
                op = control.recv(), if control_open => match op {
                    Some(Op::Interrupt { signal }) => {
                        report.repeated_interrupts += 1;
                        let threshold = self.options.force_kill_after_interrupts;
                        if !forced && threshold > 0 && report.repeated_interrupts >= threshold {
                            warn!(%signal, "repeated interrupt, killing remaining processes");
                            report.forced.extend(self.force_kill_remaining().await);
                            forced = true;
                        } else {
                            info!(%signal, "shutdown already in progress");
                        }
                    }
                    Some(Op::Shutdown) => debug!("shutdown already in progress"),
                    None => control_open = false,
                },
            }
        }

        self.kill_process_groups();
        self.phase = SessionPhase::Finished;
        report.elapsed = started.elapsed();
        info!(elapsed_ms = report.elapsed.as_millis() as u64, forced = report.forced.len(), "shutdown complete");
        report
    }

    async fn request_stop_all(&mut self) {
        for index in 0..self.processes.len() {
            let process = &mut self.processes[index];

            if process.state != ProcessState::Running {
                // A leader that already exited may have left its group behind.
                if let Some(group) = process.group.filter(|&g| signal::group_alive(g)) {
                    debug!(process = %process.spec.name, "stopping leftover process group");
                    if let Err(e) = signal::terminate_group(group) {
                        debug!(process = %process.spec.name, error = %e, "graceful termination unavailable");
                    }
                }
                continue;
            }

            let delivered = match process.pid() {
                Some(pid) => signal::terminate_group(pid),
                None => Err(std::io::Error::other("process has no pid")),
            };

            match delivered {
                Ok(()) => {
                    debug!(process = %process.spec.name, "sent termination request");
                    mark_stopping(process, &self.events_tx).await;
                }
                Err(e) => {
                    warn!(process = %process.spec.name, error = %e, "graceful termination unavailable, killing");
                    if let Some(handle) = process.handle.as_mut() {
                        handle.request_kill();
                    }
                    mark_stopping(process, &self.events_tx).await;
                }
            }
        }
    }

    /// Kill every process, or leftover process group, that is still alive.
    /// Returns the names of the processes that had to be killed.
    async fn force_kill_remaining(&mut self) -> Vec<String> {
        let mut killed = Vec::new();
        for process in self.processes.iter_mut() {
            let was_killed = if process.state.is_active() {
                process
                    .handle
                    .as_mut()
                    .is_some_and(ProcessHandle::request_kill)
            } else {
                process
                    .group
                    .is_some_and(|g| signal::group_alive(g) && signal::kill_group(g).is_ok())
            };

            if was_killed {
                warn!(process = %process.spec.name, "process did not stop in time, killed");
                killed.push(process.spec.name.clone());
                let _ = self
                    .events_tx
                    .send(Event::ProcessForceKilled {
                        name: process.spec.name.clone(),
                    })
                    .await;
            }
        }
        killed
    }

    /// Whether a process that already exited left members of its process
    /// group running.
    fn has_lingering_group(&self) -> bool {
        self.processes
            .iter()
            .filter(|p| p.state.is_terminal())
            .filter_map(|p| p.group)
            .any(signal::group_alive)
    }

    /// SIGKILL every process group this session started. Groups that are
    /// already empty are not an error.
    fn kill_process_groups(&self) {
        for process in &self.processes {
            if let Some(group) = process.group {
                if let Err(e) = signal::kill_group(group) {
                    debug!(process = %process.spec.name, error = %e, "failed to kill process group");
                }
            }
        }
    }

    /// Apply an exit notice. Returns the wake-up it represents, or None for
    /// a notice about a process that is already terminal.
    async fn record_exit(&mut self, notice: ExitNotice) -> Option<Wake> {
        let process = self.processes.get_mut(notice.index)?;
        if process.state.is_terminal() {
            return None;
        }

        let expected = process.state == ProcessState::Stopping;
        match notice.result {
            Ok(status) => {
                if expected {
                    info!(process = %process.spec.name, code = ?status.code(), "process stopped");
                } else {
                    warn!(process = %process.spec.name, code = ?status.code(), "process exited");
                }
                mark_exited(process, status, &self.events_tx).await;
            }
            Err(e) => {
                warn!(process = %process.spec.name, error = %e, "failed to wait on process");
                mark_failed(process, e.to_string(), &self.events_tx).await;
            }
        }

        Some(Wake::Exited {
            name: process.spec.name.clone(),
            state: process.state.clone(),
        })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Monitors kill their child when the kill channel closes; the group
        // kill here also covers grandchildren if the runtime is going away.
        self.kill_process_groups();
    }
}

/// Own a child until it exits, or kill it when asked to.
///
/// Dropping the kill sender counts as a kill request, so a discarded
/// supervisor never leaves a child behind.
async fn monitor_child(
    index: usize,
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };

    let result = match exited {
        Some(status) => status,
        None => signal::kill_and_reap(&mut child).await,
    };

    let _ = exit_tx.send(ExitNotice { index, result });
}

fn relay_lines<R>(stream: R, name: String, which: OutputStream, events_tx: mpsc::Sender<Event>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(stream).lines());
        while let Some(Ok(line)) = lines.next().await {
            let event = Event::ProcessOutput {
                name: name.clone(),
                stream: which,
                line,
            };
            if events_tx.send(event).await.is_err() {
                break;
            }
        }
    });
}
