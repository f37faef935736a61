//! Toolchain preflight check.
//!
//! Confirms the tools a pipeline depends on are installed before any step
//! runs, so a missing `npm` shows up as one clear report rather than a
//! failed install step.

use crate::exec::{self, RunOptions};
use dr_protocol::command_models::CommandSpec;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Default bound on a single `--version` call.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// The tool resolved on PATH. `version` is the first line it printed for
    /// `--version`, if any.
    Found {
        path: PathBuf,
        version: Option<String>,
    },
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReport {
    pub name: String,
    pub status: ToolStatus,
}

impl ToolReport {
    pub fn is_found(&self) -> bool {
        matches!(self.status, ToolStatus::Found { .. })
    }
}

/// Resolve each tool on PATH and ask it for its version.
///
/// Reports come back in the order the tools were given.
pub async fn check_tools(tools: &[String], timeout: Duration) -> Vec<ToolReport> {
    let mut reports = Vec::with_capacity(tools.len());

    for name in tools {
        let status = match which::which(name) {
            Ok(path) => {
                let version = tool_version(&path, timeout).await;
                ToolStatus::Found { path, version }
            }
            Err(e) => {
                debug!(tool = %name, error = %e, "tool not found on PATH");
                ToolStatus::Missing
            }
        };
        reports.push(ToolReport {
            name: name.clone(),
            status,
        });
    }

    reports
}

/// Whether every report is [`ToolStatus::Found`].
pub fn all_present(reports: &[ToolReport]) -> bool {
    reports.iter().all(ToolReport::is_found)
}

async fn tool_version(path: &std::path::Path, timeout: Duration) -> Option<String> {
    let spec = CommandSpec::new([path.to_string_lossy().into_owned(), "--version".to_string()]);
    let options = RunOptions::unchecked().with_timeout(timeout);

    match exec::run(&spec, &options).await {
        Ok(output) if output.success() => {
            // Some tools (python2, java) print their version on stderr.
            let text = if output.stdout.trim().is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            text.lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(String::from)
        }
        Ok(output) => {
            debug!(tool = %path.display(), code = ?output.exit_code, "version query failed");
            None
        }
        Err(e) => {
            debug!(tool = %path.display(), error = %e, "version query failed");
            None
        }
    }
}
