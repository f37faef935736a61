//! Global configuration models for `.devrun/config.toml`.
//!
//! This module defines the structure of the global configuration file that
//! controls supervision, probing and preflight settings.

use serde::Deserialize;
use serde::Serialize;

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_force_kill_after_interrupts() -> u32 {
    2
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_tools() -> Vec<String> {
    ["node", "npm", "python3", "git"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Represents global settings from `.devrun/config.toml`.
///
/// # Example
///
/// ```toml
/// # .devrun/config.toml
/// shutdown_timeout_secs = 5
/// force_kill_after_interrupts = 2
/// probe_timeout_ms = 2000
/// prefix_output = false
///
/// [preflight]
/// tools = ["node", "npm", "python3", "git"]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// How long a graceful shutdown may take before children are killed.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Number of additional interrupts, received while a shutdown is already
    /// in progress, that force-kill every remaining child. Zero disables
    /// escalation.
    #[serde(default = "default_force_kill_after_interrupts")]
    pub force_kill_after_interrupts: u32,

    /// Timeout for a single health probe, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Relay child output through devrun with a `[name]` prefix instead of
    /// letting children write to the terminal directly.
    #[serde(default)]
    pub prefix_output: bool,

    #[serde(default)]
    pub preflight: PreflightConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            force_kill_after_interrupts: default_force_kill_after_interrupts(),
            probe_timeout_ms: default_probe_timeout_ms(),
            prefix_output: false,
            preflight: PreflightConfig::default(),
        }
    }
}

/// Tools that must be on `PATH` before a pipeline runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PreflightConfig {
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            tools: default_tools(),
        }
    }
}
