//! Operator interrupt source.
//!
//! Turns SIGINT/SIGTERM (or Ctrl+C on other platforms) into [`Op::Interrupt`]
//! messages on the supervisor's control channel. Every delivered signal
//! becomes one message; deciding what a repeat means is left to the
//! supervisor's control loop.

use dr_protocol::ipc::Op;
use dr_protocol::process_models::InterruptSignal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Size of the control channel returned by [`control_channel`].
pub const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Create the control channel the supervisor consumes.
pub fn control_channel() -> (mpsc::Sender<Op>, mpsc::Receiver<Op>) {
    mpsc::channel(CONTROL_CHANNEL_CAPACITY)
}

/// Spawn a task forwarding operator signals into `control_tx`.
///
/// Installing the handlers replaces the default "terminate on SIGINT"
/// behaviour for the whole process, so devrun itself only exits once the
/// supervisor has finished its shutdown. The task ends when the receiving
/// side of the channel is dropped.
pub fn spawn_signal_listener(control_tx: mpsc::Sender<Op>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(sig) => sig,
                Err(e) => {
                    error!(error = %e, "failed to install SIGINT handler");
                    return;
                }
            };
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };

            loop {
                let received = tokio::select! {
                    Some(()) = sigint.recv() => InterruptSignal::Interrupt,
                    Some(()) = sigterm.recv() => InterruptSignal::Terminate,
                    else => break,
                };
                debug!(signal = %received, "received operator signal");
                if control_tx
                    .send(Op::Interrupt { signal: received })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }

        #[cfg(not(unix))]
        {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to install Ctrl+C handler");
                    return;
                }
                debug!("received Ctrl+C");
                let op = Op::Interrupt {
                    signal: InterruptSignal::Interrupt,
                };
                if control_tx.send(op).await.is_err() {
                    break;
                }
            }
        }
    })
}
