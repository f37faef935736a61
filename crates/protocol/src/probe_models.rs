//! Health probe models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named endpoint to probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub name: String,
    pub url: String,
}

impl ProbeTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Result of probing a single target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeOutcome {
    /// The endpoint answered with a success status.
    Reachable { status: u16, latency_ms: u64 },

    /// The endpoint answered, but not with a success status.
    Unhealthy { status: u16 },

    /// No answer within the timeout, or the connection failed.
    Unreachable { reason: String },
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Reachable { status, latency_ms } => {
                write!(f, "running (HTTP {status}, {latency_ms}ms)")
            }
            ProbeOutcome::Unhealthy { status } => write!(f, "unhealthy (HTTP {status})"),
            ProbeOutcome::Unreachable { reason } => write!(f, "not running ({reason})"),
        }
    }
}
