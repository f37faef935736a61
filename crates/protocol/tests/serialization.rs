use dr_protocol::*;

#[test]
fn test_pipeline_deserialization_from_yaml() {
    let yaml_str = r#"
name: build
steps:
  - name: install-npm
    command: ["npm", "install"]
  - name: install-python
    command: ["pip", "install", "-r", "requirements.txt"]
    required: false
    if-exists: requirements.txt
  - name: compile
    command: ["npm", "run", "build"]
    cwd: "web"
    env:
      NODE_ENV: production
    timeout-secs: 600
"#;

    let pipeline: Pipeline = serde_yaml::from_str(yaml_str).expect("Failed to deserialize Pipeline");

    assert_eq!(pipeline.name, "build");
    assert_eq!(pipeline.steps.len(), 3);

    assert!(pipeline.steps[0].required, "steps are required by default");
    assert!(!pipeline.steps[1].required);
    assert_eq!(
        pipeline.steps[1].if_exists.as_deref(),
        Some(std::path::Path::new("requirements.txt"))
    );
    assert!(pipeline.steps[0].if_exists.is_none());

    let compile = &pipeline.steps[2];
    assert_eq!(compile.command.argv, vec!["npm", "run", "build"]);
    assert_eq!(compile.command.cwd.as_deref(), Some(std::path::Path::new("web")));
    assert_eq!(
        compile.command.env.get("NODE_ENV").map(String::as_str),
        Some("production")
    );
    assert_eq!(compile.timeout_secs, Some(600));
}

#[test]
fn test_process_spec_deserialization_from_yaml() {
    let yaml_str = r#"
name: backend
command: ["uvicorn", "api-server:app", "--port", "8000"]
health-url: "http://localhost:8000/api/health"
"#;

    let spec: ProcessSpec = serde_yaml::from_str(yaml_str).expect("Failed to deserialize ProcessSpec");

    assert_eq!(spec.name, "backend");
    assert_eq!(spec.command.program(), Some("uvicorn"));
    assert_eq!(spec.command.args().len(), 3);
    assert_eq!(
        spec.health_url.as_deref(),
        Some("http://localhost:8000/api/health")
    );
    assert!(spec.command.env.is_empty());
}

#[test]
fn test_global_config_defaults_from_empty_toml() {
    let config: GlobalConfig = toml::from_str("").expect("Failed to parse empty config");

    assert_eq!(config, GlobalConfig::default());
    assert_eq!(config.shutdown_timeout_secs, 5);
    assert_eq!(config.force_kill_after_interrupts, 2);
    assert_eq!(config.probe_timeout_ms, 2000);
    assert!(!config.prefix_output);
    assert_eq!(config.preflight.tools, vec!["node", "npm", "python3", "git"]);
}

#[test]
fn test_global_config_overrides() {
    let config: GlobalConfig = toml::from_str(
        r#"
shutdown_timeout_secs = 10
prefix_output = true

[preflight]
tools = ["cargo"]
"#,
    )
    .expect("Failed to parse config");

    assert_eq!(config.shutdown_timeout_secs, 10);
    assert_eq!(config.force_kill_after_interrupts, 2);
    assert!(config.prefix_output);
    assert_eq!(config.preflight.tools, vec!["cargo"]);
}

#[test]
fn test_process_state_serialization() {
    let json = serde_json::to_value(ProcessState::Exited { code: Some(3) }).expect("serialize");
    assert_eq!(json["state"], "EXITED");
    assert_eq!(json["code"], 3);

    let json = serde_json::to_value(ProcessState::Running).expect("serialize");
    assert_eq!(json["state"], "RUNNING");
}

#[test]
fn test_op_serialization() {
    let op = Op::Interrupt {
        signal: InterruptSignal::Terminate,
    };

    let json = serde_json::to_string(&op).expect("Failed to serialize Op");
    assert!(json.contains("\"type\":\"interrupt\""));
    assert!(json.contains("\"signal\":\"TERMINATE\""));

    let deserialized: Op = serde_json::from_str(&json).expect("Failed to deserialize Op");
    assert_eq!(deserialized, op);
}

#[test]
fn test_event_serialization() {
    let event = Event::StepFinished {
        index: 1,
        name: "lint".to_string(),
        required: true,
        outcome: StepOutcome::Failure {
            message: "exit code 1".to_string(),
        },
        duration_ms: 42,
    };

    let json = serde_json::to_value(&event).expect("Failed to serialize Event");
    assert_eq!(json["type"], "stepFinished");
    assert_eq!(json["payload"]["outcome"]["outcome"], "FAILURE");
    assert_eq!(json["payload"]["outcome"]["message"], "exit code 1");
}

#[test]
fn test_shutdown_reason_exit_codes() {
    assert_eq!(
        ShutdownReason::Interrupted {
            signal: InterruptSignal::Interrupt
        }
        .exit_code(),
        0
    );
    assert_eq!(
        ShutdownReason::UnexpectedExit {
            name: "backend".to_string(),
            code: Some(1)
        }
        .exit_code(),
        1
    );
    assert_eq!(
        ShutdownReason::SpawnFailed {
            name: "frontend".to_string(),
            error: "not found".to_string()
        }
        .exit_code(),
        1
    );
}

#[test]
fn test_shutdown_reason_summaries_are_distinct() {
    let by_request = ShutdownReason::Interrupted {
        signal: InterruptSignal::Interrupt,
    }
    .to_string();
    let crashed = ShutdownReason::UnexpectedExit {
        name: "backend".to_string(),
        code: Some(2),
    }
    .to_string();

    assert!(by_request.contains("stopped cleanly by request"));
    assert!(crashed.contains("backend crashed"));
    assert!(crashed.contains("exit code 2"));
}

#[test]
fn test_pipeline_run_summary_reports_abort_position() {
    let now = chrono::Utc::now();
    let step = |name: &str, outcome: StepOutcome| StepResult {
        name: name.to_string(),
        required: true,
        outcome,
        exit_code: None,
        duration_ms: 0,
    };

    let run = PipelineRun {
        id: uuid::Uuid::new_v4(),
        pipeline_name: "build".to_string(),
        steps: vec![
            step("a", StepOutcome::Success),
            step(
                "b",
                StepOutcome::Failure {
                    message: "boom".to_string(),
                },
            ),
            step("c", StepOutcome::NotRun),
        ],
        started_at: now,
        finished_at: now,
        success: false,
    };

    assert_eq!(run.executed_count(), 2);
    let (position, failed) = run.blocking_failure().expect("should have a blocking failure");
    assert_eq!(position, 2);
    assert_eq!(failed.name, "b");
    assert!(run.to_string().contains("aborted at step 2 of 3"));
}

#[test]
fn test_pipeline_run_summary_reports_interruption() {
    let now = chrono::Utc::now();
    let step = |name: &str, required: bool, outcome: StepOutcome| StepResult {
        name: name.to_string(),
        required,
        outcome,
        exit_code: None,
        duration_ms: 0,
    };

    let run = PipelineRun {
        id: uuid::Uuid::new_v4(),
        pipeline_name: "build".to_string(),
        steps: vec![
            step(
                "type-check",
                true,
                StepOutcome::Skipped {
                    reason: "tsconfig.json not found".to_string(),
                },
            ),
            step("install-python", false, StepOutcome::Interrupted),
            step("compile", true, StepOutcome::NotRun),
        ],
        started_at: now,
        finished_at: now,
        success: false,
    };

    assert_eq!(run.executed_count(), 1);
    assert!(run.blocking_failure().is_none());
    assert_eq!(run.interrupted_at().map(|(pos, _)| pos), Some(2));
    assert!(run.to_string().contains("interrupted at step 2 of 3 (install-python)"));
}
