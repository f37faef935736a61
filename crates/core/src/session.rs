//! Dev environment session.
//!
//! Glues the supervisor lifecycle together: start everything, wait for the
//! first reason to stop, shut down exactly once, and report.

use crate::supervisor::{Supervisor, SupervisorOptions};
use dr_protocol::ipc::{Event, Op};
use dr_protocol::process_models::{ProcessSnapshot, ProcessSpec, ShutdownReason};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Final summary of a [`run_dev_environment`] session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevSessionOutcome {
    pub reason: ShutdownReason,

    /// Final state of every process, in configured order.
    pub processes: Vec<ProcessSnapshot>,

    /// Processes that had to be killed during shutdown.
    pub forced: Vec<String>,

    pub shutdown_elapsed: Duration,
}

impl DevSessionOutcome {
    /// Process exit code for the session: 0 for a clean stop, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

/// Run a supervised dev environment until it stops.
///
/// Every process in `specs` is started. The session then waits until the
/// first process terminates or `control` delivers an interrupt or shutdown
/// request, and tears down every remaining process within
/// `options.shutdown_timeout`. Interrupts that arrive during the teardown
/// never start a second one.
///
/// This never fails: child failures are reported through the returned
/// outcome's [`ShutdownReason`].
pub async fn run_dev_environment(
    specs: Vec<ProcessSpec>,
    options: SupervisorOptions,
    mut control: mpsc::Receiver<Op>,
    events_tx: mpsc::Sender<Event>,
) -> DevSessionOutcome {
    let timeout = options.shutdown_timeout;
    let mut supervisor = Supervisor::new(specs, options, events_tx.clone());

    let reason = match supervisor.start_all().await {
        Some(failure) => failure,
        None => supervisor.wait_any(&mut control).await.into_reason(),
    };

    if reason.is_clean() {
        info!(reason = %reason, "shutting down");
    } else {
        warn!(reason = %reason, "shutting down");
    }
    let _ = events_tx
        .send(Event::ShutdownStarted {
            reason: reason.clone(),
        })
        .await;

    let report = supervisor.shutdown(timeout, &mut control).await;

    let _ = events_tx
        .send(Event::ShutdownCompleted {
            reason: reason.clone(),
        })
        .await;

    DevSessionOutcome {
        reason,
        processes: supervisor.snapshot(),
        forced: report.forced,
        shutdown_elapsed: report.elapsed,
    }
}
