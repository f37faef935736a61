//! Terminal rendering of engine events and summaries.

use colored::Colorize;
use dr_core::preflight::{ToolReport, ToolStatus};
use dr_core::probe::WorkspaceStatus;
use dr_core::session::DevSessionOutcome;
use dr_core::setup::{EnvFile, ENV_FILE, ENV_TEMPLATE};
use dr_protocol::ipc::{Event, OutputStream};
use dr_protocol::pipeline_models::{PipelineRun, StepOutcome};
use dr_protocol::probe_models::ProbeOutcome;
use dr_protocol::process_models::ProcessState;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const RULE_WIDTH: usize = 60;

pub fn header(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("\n{}\n{}\n{}\n", rule.magenta().bold(), title.magenta().bold(), rule.magenta().bold())
}

fn success(message: &str) -> String {
    format!("{} {message}", "✓".green())
}

fn failure(message: &str) -> String {
    format!("{} {message}", "✗".red())
}

fn info(message: &str) -> String {
    format!("{} {message}", "ℹ".cyan())
}

/// Render one engine event as a terminal line, or None for events that
/// are not shown.
pub fn render_event(event: &Event) -> Option<String> {
    match event {
        Event::ProcessStarted { name, pid } => Some(info(&match pid {
            Some(pid) => format!("started {} (pid {pid})", name.bold()),
            None => format!("started {}", name.bold()),
        })),
        Event::ProcessStateUpdate { name, state } => match state {
            ProcessState::Exited { code: Some(0) } => Some(success(&format!("{name} exited"))),
            ProcessState::Exited { code } => Some(failure(&format!(
                "{name} exited ({})",
                match code {
                    Some(code) => format!("code {code}"),
                    None => "signal".to_string(),
                }
            ))),
            ProcessState::Failed { error } => Some(failure(&format!("{name}: {error}"))),
            _ => None,
        },
        Event::ProcessOutput { name, stream, line } => {
            let prefix = format!("[{name}]");
            let prefix = match stream {
                OutputStream::Stdout => prefix.cyan(),
                OutputStream::Stderr => prefix.yellow(),
            };
            Some(format!("{prefix} {line}"))
        }
        Event::ShutdownStarted { reason } => Some(info(&format!("shutting down: {reason}"))),
        Event::ProcessForceKilled { name } => {
            Some(failure(&format!("{name} did not stop in time, killed")))
        }
        Event::ShutdownCompleted { .. } => None,
        Event::PipelineStarted { name, total_steps } => {
            Some(header(&format!("Pipeline {name} ({total_steps} steps)")))
        }
        Event::StepStarted { index, total, name } => Some(info(&format!(
            "[{}/{total}] {}",
            index + 1,
            name.bold()
        ))),
        Event::StepFinished {
            name,
            required,
            outcome,
            duration_ms,
            ..
        } => match outcome {
            StepOutcome::Success => Some(success(&format!("{name} ({duration_ms}ms)"))),
            StepOutcome::Failure { message } if *required => {
                Some(failure(&format!("{name} failed: {message}")))
            }
            StepOutcome::Failure { message } => Some(format!(
                "{} {name} failed (optional, continuing): {message}",
                "!".yellow()
            )),
            StepOutcome::Skipped { reason } => Some(format!(
                "{} {name} skipped: {reason}",
                "-".dimmed()
            )),
            StepOutcome::Interrupted => Some(failure(&format!("{name} interrupted"))),
            StepOutcome::NotRun => None,
        },
        Event::PipelineFinished { .. } => None,
    }
}

/// Print every event until the channel closes.
pub fn spawn_printer(mut events_rx: mpsc::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let Some(line) = render_event(&event) {
                println!("{line}");
            }
        }
    })
}

pub fn session_summary(outcome: &DevSessionOutcome) -> String {
    let reason = outcome.reason.to_string();
    let mut out = if outcome.reason.is_clean() {
        success(&reason)
    } else {
        failure(&reason)
    };
    if !outcome.forced.is_empty() {
        out.push_str(&format!(
            "\n{}",
            info(&format!("killed after timeout: {}", outcome.forced.join(", ")))
        ));
    }
    out
}

pub fn pipeline_summary(run: &PipelineRun) -> String {
    let mut out = header("Build Summary");
    for step in &run.steps {
        let line = match &step.outcome {
            StepOutcome::Success => success(&step.name),
            StepOutcome::Failure { .. } | StepOutcome::Interrupted => failure(&step.name),
            StepOutcome::Skipped { reason } => {
                format!("{} {} ({reason})", "-".dimmed(), step.name.dimmed())
            }
            StepOutcome::NotRun => format!("{} {}", "-".dimmed(), step.name.dimmed()),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&if run.success {
        success(&run.to_string())
    } else {
        failure(&run.to_string())
    });
    out
}

pub fn setup_summary(env_file: &EnvFile) -> String {
    let mut out = match env_file {
        EnvFile::Created(_) => success(&format!("Created {ENV_FILE} from {ENV_TEMPLATE}")),
        EnvFile::AlreadyPresent => success("Environment already configured"),
        EnvFile::NoTemplate => info(&format!("No {ENV_TEMPLATE}, skipping {ENV_FILE}")),
    };
    out.push_str(&header("Setup complete"));
    out.push_str("Next steps:\n");
    out.push_str("  devrun run     start the dev environment\n");
    out.push_str("  devrun status  check that services respond\n");
    out.push_str("  devrun build   build for production");
    out
}

pub fn preflight_report(reports: &[ToolReport]) -> String {
    let mut out = header("Checking Dependencies");
    for report in reports {
        let line = match &report.status {
            ToolStatus::Found {
                version: Some(version),
                ..
            } => success(&format!("{}: {version}", report.name)),
            ToolStatus::Found { path, version: None } => {
                success(&format!("{}: {}", report.name, path.display()))
            }
            ToolStatus::Missing => failure(&format!("{}: Not found", report.name)),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub fn status_report(services: &BTreeMap<String, ProbeOutcome>, workspace: &WorkspaceStatus) -> String {
    let mut out = header("Service Status");
    if services.is_empty() {
        out.push_str(&info("no services declare a health url"));
        out.push('\n');
    }
    for (name, outcome) in services {
        let line = format!("{name}: {outcome}");
        out.push_str(&if outcome.is_reachable() {
            success(&line)
        } else {
            failure(&line)
        });
        out.push('\n');
    }

    out.push_str(&header("Workspace"));
    out.push_str(&match workspace.build_output_files {
        Some(count) => success(&format!("Build output: {count} files in dist/")),
        None => info("Not built yet"),
    });
    out.push('\n');
    out.push_str(&if workspace.dependencies_installed {
        success("Dependencies installed")
    } else {
        failure("Dependencies not installed (run npm install)")
    });
    out
}
