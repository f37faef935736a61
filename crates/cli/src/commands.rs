//! Subcommand implementations. Each returns the process exit code.

use crate::output;
use color_eyre::eyre::{eyre, Result};
use dr_core::artifacts;
use dr_core::config::AppConfig;
use dr_core::engine::PipelineEngine;
use dr_core::init::{generate_devrun_structure, InitOptions};
use dr_core::preflight::{self, VERSION_TIMEOUT};
use dr_core::probe::{probe_status, workspace_status};
use dr_core::session::run_dev_environment;
use dr_core::setup::ensure_env_file;
use dr_core::supervisor::interrupt::{control_channel, spawn_signal_listener};
use dr_core::supervisor::SupervisorOptions;
use dr_protocol::pipeline_models::{Pipeline, PipelineRun};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub async fn run(config: &AppConfig, only: &[String], shutdown_timeout: Option<u64>) -> Result<i32> {
    let specs = config.select_services(only)?;

    let mut options = SupervisorOptions::from(&config.global);
    if let Some(secs) = shutdown_timeout {
        options.shutdown_timeout = Duration::from_secs(secs);
    }

    let (control_tx, control_rx) = control_channel();
    let listener = spawn_signal_listener(control_tx);
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let printer = output::spawn_printer(events_rx);

    println!("{}", output::header("Starting dev environment"));
    let outcome = run_dev_environment(specs, options, control_rx, events_tx).await;

    listener.abort();
    let _ = printer.await;

    println!("{}", output::session_summary(&outcome));
    Ok(outcome.exit_code())
}

pub async fn build(
    config: &AppConfig,
    pipeline_name: &str,
    steps: &[String],
    skip_preflight: bool,
) -> Result<i32> {
    let pipeline = config.pipeline_with_steps(pipeline_name, steps)?;

    if !skip_preflight && !preflight_passes(config).await {
        eprintln!("Missing required tools; install them or pass --skip-preflight.");
        return Ok(1);
    }

    let run = run_pipeline(&pipeline).await;
    println!("{}", output::pipeline_summary(&run));
    Ok(if run.success { 0 } else { 1 })
}

pub async fn setup(config: &AppConfig) -> Result<i32> {
    println!("{}", output::header("Setup"));

    if !preflight_passes(config).await {
        eprintln!("Missing required tools; install them and run setup again.");
        return Ok(1);
    }

    let run = run_pipeline(&config.setup_pipeline()).await;
    println!("{}", output::pipeline_summary(&run));
    if !run.success {
        return Ok(1);
    }

    let env_file = ensure_env_file(&config.root)?;
    println!("{}", output::setup_summary(&env_file));
    Ok(0)
}

async fn preflight_passes(config: &AppConfig) -> bool {
    let reports = preflight::check_tools(&config.global.preflight.tools, VERSION_TIMEOUT).await;
    println!("{}", output::preflight_report(&reports));
    preflight::all_present(&reports)
}

/// Run a pipeline with progress output. Ctrl+C stops the running step and
/// everything it started.
async fn run_pipeline(pipeline: &Pipeline) -> PipelineRun {
    let (control_tx, mut control_rx) = control_channel();
    let listener = spawn_signal_listener(control_tx);
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let printer = output::spawn_printer(events_rx);

    let run = PipelineEngine::default()
        .run_interruptible(pipeline, &events_tx, &mut control_rx)
        .await;

    listener.abort();
    drop(events_tx);
    let _ = printer.await;
    run
}

pub async fn status(config: &AppConfig, json: bool) -> Result<i32> {
    let timeout = Duration::from_millis(config.global.probe_timeout_ms);
    let services = probe_status(&config.probe_targets(), timeout).await?;
    let workspace = workspace_status(&config.root);

    if json {
        let report = serde_json::json!({
            "services": services,
            "workspace": {
                "build_output_files": workspace.build_output_files,
                "dependencies_installed": workspace.dependencies_installed,
            },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", output::status_report(&services, &workspace));
    }
    Ok(0)
}

pub async fn init(root: &Path, force: bool, minimal: bool) -> Result<i32> {
    let written = generate_devrun_structure(InitOptions {
        target_dir: root.to_path_buf(),
        force,
        minimal,
    })
    .await?;

    for path in written {
        println!("created {}", path.display());
    }
    Ok(0)
}

pub fn clean(root: &Path) -> Result<i32> {
    let removed = artifacts::clean_workspace(root)?;
    if removed.is_empty() {
        println!("nothing to clean");
    }
    for path in removed {
        println!("removed {}", path.display());
    }
    Ok(0)
}

pub async fn build_info(root: &Path, output: &Path, app_version: &str) -> Result<i32> {
    match artifacts::generate_build_info(root, output, app_version)
        .await
        .map_err(|e| eyre!("Failed to generate build info: {e:#}"))?
    {
        Some(path) => println!("Build info generated: {}", path.display()),
        None => println!(
            "No {} directory, skipping build info",
            parent_display(output)
        ),
    }
    Ok(0)
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|parent| parent.display().to_string())
        .unwrap_or_default()
}
