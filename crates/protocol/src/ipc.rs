//! Engine communication protocol.
//!
//! This module defines the message types exchanged between the engines in
//! `dr-core` and whatever drives them (the CLI, tests, an embedding tool).
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: Control requests delivered into the supervisor's control loop
//! - `Event`: Progress updates sent from the engines to the front end
//!
//! Communication is channel-based, so the supervisor never mutates shared
//! state from a signal-handling context.

use serde::{Deserialize, Serialize};

use crate::pipeline_models::StepOutcome;
use crate::process_models::{InterruptSignal, ProcessState, ShutdownReason};

/// Control requests consumed by the supervisor.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// { "type": "interrupt", "payload": { "signal": "INTERRUPT" } }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// An operator interrupt (Ctrl+C or a termination signal).
    Interrupt { signal: InterruptSignal },

    /// Programmatic request to stop the session gracefully.
    Shutdown,
}

/// Which output stream a relayed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Progress events sent from the engines.
///
/// ```json
/// {
///   "type": "processStateUpdate",
///   "payload": { "name": "backend", "state": { "state": "RUNNING" } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A supervised process was spawned.
    ProcessStarted { name: String, pid: Option<u32> },

    /// A supervised process changed state.
    ProcessStateUpdate { name: String, state: ProcessState },

    /// A line of output relayed from a supervised process.
    ProcessOutput {
        name: String,
        stream: OutputStream,
        line: String,
    },

    /// The supervisor started tearing the session down.
    ShutdownStarted { reason: ShutdownReason },

    /// A process ignored the graceful request and was killed.
    ProcessForceKilled { name: String },

    /// Every supervised process is terminal.
    ShutdownCompleted { reason: ShutdownReason },

    /// A pipeline run began.
    PipelineStarted { name: String, total_steps: usize },

    /// A step is about to run. `index` is zero-based.
    StepStarted {
        index: usize,
        total: usize,
        name: String,
    },

    /// A step finished.
    StepFinished {
        index: usize,
        name: String,
        required: bool,
        outcome: StepOutcome,
        duration_ms: u64,
    },

    /// The pipeline finished, successfully or not.
    PipelineFinished { name: String, success: bool },
}
