//! Health and status probing.
//!
//! Probes are read-only: they never touch supervisor state and can run while
//! a dev session is up in another terminal.

pub mod workspace;

pub use workspace::{workspace_status, WorkspaceStatus};

use dr_protocol::probe_models::{ProbeOutcome, ProbeTarget};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::debug;

/// Errors that can occur while setting up probing.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Bounded-timeout HTTP health probe.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        // Health URLs are local; an HTTP(S)_PROXY from the environment must not
        // intercept them.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Probe one target. Always returns within roughly the configured timeout.
    pub async fn probe(&self, target: &ProbeTarget) -> ProbeOutcome {
        let started = Instant::now();
        let request = self.client.get(&target.url).send();

        let outcome = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => ProbeOutcome::Unreachable {
                reason: format!("no response within {}ms", self.timeout.as_millis()),
            },
            Ok(Err(e)) if e.is_timeout() => ProbeOutcome::Unreachable {
                reason: format!("no response within {}ms", self.timeout.as_millis()),
            },
            Ok(Err(e)) if e.is_connect() => ProbeOutcome::Unreachable {
                reason: "connection refused".to_string(),
            },
            Ok(Err(e)) => ProbeOutcome::Unreachable {
                reason: e.to_string(),
            },
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    ProbeOutcome::Reachable {
                        status: status.as_u16(),
                        latency_ms: started.elapsed().as_millis() as u64,
                    }
                } else {
                    ProbeOutcome::Unhealthy {
                        status: status.as_u16(),
                    }
                }
            }
        };

        debug!(target = %target.name, url = %target.url, outcome = %outcome, "probed");
        outcome
    }

    /// Probe every target concurrently.
    pub async fn probe_all(&self, targets: &[ProbeTarget]) -> BTreeMap<String, ProbeOutcome> {
        let mut set = JoinSet::new();
        for target in targets {
            let probe = self.clone();
            let target = target.clone();
            set.spawn(async move {
                let outcome = probe.probe(&target).await;
                (target.name, outcome)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    results.insert(name, outcome);
                }
                Err(e) => debug!(error = %e, "probe task did not complete"),
            }
        }
        results
    }
}

/// Probe `targets` with a fresh client, keyed by target name.
pub async fn probe_status(
    targets: &[ProbeTarget],
    timeout: Duration,
) -> Result<BTreeMap<String, ProbeOutcome>, ProbeError> {
    let probe = HealthProbe::new(timeout)?;
    Ok(probe.probe_all(targets).await)
}
