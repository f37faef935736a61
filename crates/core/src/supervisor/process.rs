//! Managed process state machine.
//!
//! This module provides the [`ManagedProcess`] record the supervisor owns for
//! each configured service, plus the functions that move it through its
//! lifecycle and emit the matching events.

use dr_protocol::ipc::Event;
use dr_protocol::process_models::{ProcessSnapshot, ProcessSpec, ProcessState};
use std::process::ExitStatus;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// OS-level handle for a running child.
///
/// The child itself is owned by its monitor task; the supervisor keeps the
/// pid for signalling and a channel to ask the monitor for a forced kill.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    pub(crate) pid: Option<u32>,
    pub(crate) kill_tx: Option<oneshot::Sender<()>>,
    pub(crate) monitor: JoinHandle<()>,
}

impl ProcessHandle {
    /// Ask the monitor task to kill and reap the child.
    ///
    /// Returns false if a kill was already requested or the monitor is gone.
    pub(crate) fn request_kill(&mut self) -> bool {
        match self.kill_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// A named external command under supervision.
#[derive(Debug)]
pub struct ManagedProcess {
    pub spec: ProcessSpec,
    pub state: ProcessState,
    pub(crate) handle: Option<ProcessHandle>,

    /// Process group the child leads. Outlives the handle, since members of
    /// the group can keep running after the leader has been reaped.
    pub(crate) group: Option<u32>,
}

impl ManagedProcess {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Pid of the running child, if it has one.
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid)
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            name: self.spec.name.clone(),
            pid: self.pid(),
            state: self.state.clone(),
        }
    }
}

/// Create a new ManagedProcess in Pending state.
pub fn create_process(spec: ProcessSpec) -> ManagedProcess {
    ManagedProcess {
        spec,
        state: ProcessState::Pending,
        handle: None,
        group: None,
    }
}

/// Record a successful spawn and emit ProcessStarted.
pub(crate) async fn mark_running(
    process: &mut ManagedProcess,
    handle: ProcessHandle,
    events_tx: &Sender<Event>,
) {
    let pid = handle.pid;
    process.group = pid;
    process.handle = Some(handle);
    process.state = ProcessState::Running;
    let _ = events_tx
        .send(Event::ProcessStarted {
            name: process.spec.name.clone(),
            pid,
        })
        .await;
    emit_state(process, events_tx).await;
}

/// Transition to Stopping once a termination request has been delivered.
pub async fn mark_stopping(process: &mut ManagedProcess, events_tx: &Sender<Event>) {
    process.state = ProcessState::Stopping;
    emit_state(process, events_tx).await;
}

/// Record the OS-reported completion of the child and release its handle.
pub async fn mark_exited(process: &mut ManagedProcess, status: ExitStatus, events_tx: &Sender<Event>) {
    process.handle = None;
    process.state = ProcessState::Exited {
        code: status.code(),
    };
    emit_state(process, events_tx).await;
}

/// Mark the process as failed, releasing any handle it had.
pub async fn mark_failed(process: &mut ManagedProcess, error: String, events_tx: &Sender<Event>) {
    process.handle = None;
    process.state = ProcessState::Failed { error };
    emit_state(process, events_tx).await;
}

async fn emit_state(process: &ManagedProcess, events_tx: &Sender<Event>) {
    let _ = events_tx
        .send(Event::ProcessStateUpdate {
            name: process.spec.name.clone(),
            state: process.state.clone(),
        })
        .await;
}
