//! Pipeline execution engine.
//!
//! The PipelineEngine runs the steps of a [`Pipeline`] one at a time, in
//! declared order, and folds their outcomes into a [`PipelineRun`].
//!
//! A failing required step stops the run: every later step is recorded as
//! `NotRun`. A failing optional step is recorded and the run continues.
//! A step whose `if-exists` path is missing is `Skipped`. Steps are never
//! retried.

use crate::exec::{self, ExecError, OutputMode, RunOptions};
use chrono::Utc;
use dr_protocol::ipc::{Event, Op};
use dr_protocol::pipeline_models::{Pipeline, PipelineRun, StepOutcome, StepResult, StepSpec};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, Sender};
use tracing::{info, warn};
use uuid::Uuid;

/// Engine settings shared by every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Where step output goes. With [`OutputMode::Capture`] a failing step's
    /// last stderr line is folded into its failure message.
    pub output: OutputMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            output: OutputMode::Capture,
        }
    }
}

/// The main pipeline execution engine.
#[derive(Debug, Clone, Default)]
pub struct PipelineEngine {
    options: EngineOptions,
}

impl PipelineEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// Execute a pipeline and return its aggregate result.
    ///
    /// Progress is reported on `events_tx` as PipelineStarted, then a
    /// StepStarted/StepFinished pair per executed step (a lone StepFinished
    /// for a skipped one), then PipelineFinished. A closed event channel does
    /// not affect execution.
    pub async fn run(&self, pipeline: &Pipeline, events_tx: &Sender<Event>) -> PipelineRun {
        self.execute(pipeline, events_tx, None).await
    }

    /// Like [`run`](Self::run), but the first request on `control` stops the
    /// current step's process group and ends the run. The interrupted step
    /// is recorded as `Interrupted` and every later step as `NotRun`.
    pub async fn run_interruptible(
        &self,
        pipeline: &Pipeline,
        events_tx: &Sender<Event>,
        control: &mut mpsc::Receiver<Op>,
    ) -> PipelineRun {
        self.execute(pipeline, events_tx, Some(control)).await
    }

    async fn execute(
        &self,
        pipeline: &Pipeline,
        events_tx: &Sender<Event>,
        mut control: Option<&mut mpsc::Receiver<Op>>,
    ) -> PipelineRun {
        let started_at = Utc::now();
        let total = pipeline.steps.len();

        info!(pipeline = %pipeline.name, steps = total, "starting pipeline");
        let _ = events_tx
            .send(Event::PipelineStarted {
                name: pipeline.name.clone(),
                total_steps: total,
            })
            .await;

        let mut results = Vec::with_capacity(total);
        let mut aborted = false;
        let mut interrupted = false;

        for (index, step) in pipeline.steps.iter().enumerate() {
            if aborted || interrupted {
                results.push(StepResult::not_run(step));
                continue;
            }

            let result = match unmet_precondition(step) {
                Some(reason) => {
                    info!(step = %step.name, %reason, "skipping step");
                    StepResult {
                        name: step.name.clone(),
                        required: step.required,
                        outcome: StepOutcome::Skipped { reason },
                        exit_code: None,
                        duration_ms: 0,
                    }
                }
                None => {
                    let _ = events_tx
                        .send(Event::StepStarted {
                            index,
                            total,
                            name: step.name.clone(),
                        })
                        .await;
                    self.run_step(step, control.as_deref_mut()).await
                }
            };

            let _ = events_tx
                .send(Event::StepFinished {
                    index,
                    name: result.name.clone(),
                    required: result.required,
                    outcome: result.outcome.clone(),
                    duration_ms: result.duration_ms,
                })
                .await;

            if result.outcome == StepOutcome::Interrupted {
                warn!(pipeline = %pipeline.name, step = %step.name, "pipeline interrupted");
                interrupted = true;
            } else if result.outcome.is_failure() {
                if step.required {
                    warn!(pipeline = %pipeline.name, step = %step.name, "required step failed, aborting");
                    aborted = true;
                } else {
                    warn!(pipeline = %pipeline.name, step = %step.name, "optional step failed, continuing");
                }
            }
            results.push(result);
        }

        // An empty pipeline takes no time at all.
        let finished_at = if total == 0 { started_at } else { Utc::now() };

        let run = PipelineRun {
            id: Uuid::new_v4(),
            pipeline_name: pipeline.name.clone(),
            success: !aborted && !interrupted,
            steps: results,
            started_at,
            finished_at,
        };

        info!(pipeline = %pipeline.name, success = run.success, elapsed_ms = run.elapsed_ms(), "pipeline finished");
        let _ = events_tx
            .send(Event::PipelineFinished {
                name: pipeline.name.clone(),
                success: run.success,
            })
            .await;

        run
    }

    async fn run_step(&self, step: &StepSpec, control: Option<&mut mpsc::Receiver<Op>>) -> StepResult {
        let mut options = RunOptions::default().with_output(self.options.output);
        if let Some(secs) = step.timeout_secs {
            options = options.with_timeout(Duration::from_secs(secs));
        }

        info!(step = %step.name, command = %step.command, "running step");
        let started = Instant::now();
        let executed = exec::run_until(&step.command, &options, next_control_request(control)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (outcome, exit_code) = match executed {
            Ok(output) => (StepOutcome::Success, output.exit_code),
            Err(ExecError::Interrupted { .. }) => (StepOutcome::Interrupted, None),
            Err(error) => {
                let exit_code = match &error {
                    ExecError::NonZeroExit { code, .. } => *code,
                    _ => None,
                };
                (
                    StepOutcome::Failure {
                        message: failure_message(&error),
                    },
                    exit_code,
                )
            }
        };

        StepResult {
            name: step.name.clone(),
            required: step.required,
            outcome,
            exit_code,
            duration_ms,
        }
    }
}

/// Resolves once a control request arrives. Without a control channel, or
/// once it closes, it never resolves.
async fn next_control_request(control: Option<&mut mpsc::Receiver<Op>>) {
    match control {
        Some(rx) => match rx.recv().await {
            Some(op) => info!(?op, "control request received, stopping step"),
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

/// Why a step's `if-exists` precondition fails, if it does.
fn unmet_precondition(step: &StepSpec) -> Option<String> {
    let path = step.if_exists.as_ref()?;
    let base = step.command.cwd.as_deref().unwrap_or_else(|| Path::new("."));
    if base.join(path).exists() {
        None
    } else {
        Some(format!("{} not found", path.display()))
    }
}

fn failure_message(error: &ExecError) -> String {
    match error {
        ExecError::NonZeroExit { stderr, .. } => match exec::last_line(stderr) {
            Some(line) => format!("{error}: {line}"),
            None => error.to_string(),
        },
        _ => error.to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use dr_protocol::command_models::CommandSpec;
    use tokio::sync::mpsc;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new(["sh", "-c", script])
    }

    fn pipeline(steps: Vec<StepSpec>) -> Pipeline {
        Pipeline {
            name: "test".to_string(),
            steps,
        }
    }

    #[tokio::test]
    async fn test_failure_message_includes_stderr_tail() {
        let engine = PipelineEngine::default();
        let (tx, _rx) = mpsc::channel(64);
        let pipeline = pipeline(vec![StepSpec::required(
            "lint",
            sh("echo noise >&2; echo 'lint: 3 problems' >&2; exit 1"),
        )]);

        let run = engine.run(&pipeline, &tx).await;

        match &run.steps[0].outcome {
            StepOutcome::Failure { message } => {
                assert!(message.contains("exited with code 1"), "{message}");
                assert!(message.ends_with("lint: 3 problems"), "{message}");
            }
            other => panic!("Expected Failure, got {other:?}"),
        }
        assert_eq!(run.steps[0].exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_step_timeout_is_a_failure() {
        let engine = PipelineEngine::default();
        let (tx, _rx) = mpsc::channel(64);
        let pipeline = pipeline(vec![
            StepSpec::required("hang", sh("sleep 30")).with_timeout_secs(1),
            StepSpec::required("after", sh("true")),
        ]);

        let started = Instant::now();
        let run = engine.run(&pipeline, &tx).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!run.success);
        assert!(run.steps[0].outcome.is_failure());
        assert_eq!(run.steps[0].exit_code, None);
        assert_eq!(run.steps[1].outcome, StepOutcome::NotRun);
    }

    #[tokio::test]
    async fn test_if_exists_skips_step_when_path_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let engine = PipelineEngine::default();
        let (tx, mut rx) = mpsc::channel(64);
        let pipeline = pipeline(vec![
            StepSpec::required("type-check", sh("exit 1").with_cwd(dir.path()))
                .only_if_exists("tsconfig.json"),
            StepSpec::required("lint", sh("true").with_cwd(dir.path())).only_if_exists("package.json"),
        ]);

        let run = engine.run(&pipeline, &tx).await;
        drop(tx);

        assert!(run.success, "{run}");
        assert_eq!(
            run.steps[0].outcome,
            StepOutcome::Skipped {
                reason: "tsconfig.json not found".to_string()
            }
        );
        assert_eq!(run.steps[1].outcome, StepOutcome::Success);
        assert_eq!(run.executed_count(), 1);

        let mut started = Vec::new();
        while let Some(event) = rx.recv().await {
            if let Event::StepStarted { name, .. } = event {
                started.push(name);
            }
        }
        assert_eq!(started, vec!["lint".to_string()]);
    }

    #[tokio::test]
    async fn test_interrupt_stops_current_step_and_run() {
        let engine = PipelineEngine::default();
        let (tx, _rx) = mpsc::channel(64);
        let (control_tx, mut control_rx) = mpsc::channel(4);
        let pipeline = pipeline(vec![
            StepSpec::optional("install-python", sh("exec sleep 30")),
            StepSpec::required("compile", sh("true")),
        ]);

        let interrupter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            control_tx
                .send(Op::Interrupt {
                    signal: dr_protocol::process_models::InterruptSignal::Interrupt,
                })
                .await
                .unwrap();
            control_tx
        });

        let started = Instant::now();
        let run = engine.run_interruptible(&pipeline, &tx, &mut control_rx).await;
        let _control_tx = interrupter.await.unwrap();

        assert!(started.elapsed() < exec::STOP_GRACE + Duration::from_secs(2));
        assert!(!run.success);
        assert_eq!(run.steps[0].outcome, StepOutcome::Interrupted);
        assert_eq!(run.steps[1].outcome, StepOutcome::NotRun);
        assert!(run.to_string().contains("interrupted at step 1 of 2"));
    }

    #[tokio::test]
    async fn test_closed_control_channel_does_not_interrupt() {
        let engine = PipelineEngine::default();
        let (tx, _rx) = mpsc::channel(64);
        let (control_tx, mut control_rx) = mpsc::channel::<Op>(1);
        drop(control_tx);
        let pipeline = pipeline(vec![StepSpec::required("compile", sh("sleep 0.2"))]);

        let run = engine.run_interruptible(&pipeline, &tx, &mut control_rx).await;

        assert!(run.success, "{run}");
    }

    #[tokio::test]
    async fn test_missing_program_is_a_failure() {
        let engine = PipelineEngine::default();
        let (tx, _rx) = mpsc::channel(64);
        let pipeline = pipeline(vec![StepSpec::required(
            "compile",
            CommandSpec::new(["nonexistent-command-xyz"]),
        )]);

        let run = engine.run(&pipeline, &tx).await;

        assert!(!run.success);
        assert_eq!(run.blocking_failure().map(|(pos, _)| pos), Some(1));
    }
}
