//! Test fixtures for creating sample specs and projects.

use dr_core::supervisor::SupervisorOptions;
use dr_protocol::command_models::CommandSpec;
use dr_protocol::pipeline_models::{Pipeline, StepSpec};
use dr_protocol::process_models::ProcessSpec;
use std::time::Duration;
use tempfile::TempDir;

/// A command run through `sh -c`.
#[allow(dead_code)]
pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new(["sh", "-c", script])
}

/// A service that runs until it is signalled.
#[allow(dead_code)]
pub fn long_running(name: &str) -> ProcessSpec {
    ProcessSpec::new(name, sh("exec sleep 60"))
}

/// A service that ignores SIGTERM and only dies to SIGKILL.
#[allow(dead_code)]
pub fn stubborn(name: &str) -> ProcessSpec {
    ProcessSpec::new(name, sh("trap '' TERM; while true; do sleep 0.1; done"))
}

/// A service that exits with `code` after `delay_secs`.
#[allow(dead_code)]
pub fn exits_after(name: &str, delay_secs: f64, code: i32) -> ProcessSpec {
    ProcessSpec::new(name, sh(&format!("sleep {delay_secs}; exit {code}")))
}

#[allow(dead_code)]
pub fn passing_step(name: &str, required: bool) -> StepSpec {
    step(name, required, "true")
}

#[allow(dead_code)]
pub fn failing_step(name: &str, required: bool) -> StepSpec {
    step(name, required, "echo 'step broke' >&2; exit 1")
}

/// A step that appends its name to `log`, so tests can see what ran.
#[allow(dead_code)]
pub fn recording_step(name: &str, required: bool, log: &std::path::Path, exit_code: i32) -> StepSpec {
    let script = format!("echo {name} >> '{}'; exit {exit_code}", log.display());
    step(name, required, &script)
}

fn step(name: &str, required: bool, script: &str) -> StepSpec {
    if required {
        StepSpec::required(name, sh(script))
    } else {
        StepSpec::optional(name, sh(script))
    }
}

#[allow(dead_code)]
pub fn pipeline(name: &str, steps: Vec<StepSpec>) -> Pipeline {
    Pipeline {
        name: name.to_string(),
        steps,
    }
}

/// Supervisor options with a short shutdown bound for tests.
#[allow(dead_code)]
pub fn fast_options(shutdown_timeout: Duration) -> SupervisorOptions {
    SupervisorOptions {
        shutdown_timeout,
        force_kill_after_interrupts: 2,
        prefix_output: false,
    }
}

/// Create a temporary project with a `.devrun/` directory holding one
/// pipeline definition.
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_test_project(pipeline_yaml: &str) -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let pipelines = temp_dir.path().join(".devrun/pipelines");
    std::fs::create_dir_all(&pipelines)?;
    std::fs::create_dir_all(temp_dir.path().join(".devrun/services"))?;
    std::fs::write(pipelines.join("build.yaml"), pipeline_yaml)?;
    Ok(temp_dir)
}
