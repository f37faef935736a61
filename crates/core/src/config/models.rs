//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines
//! global settings, service definitions, and pipeline definitions into a
//! single configuration object, plus the built-in defaults used when a
//! project has no `.devrun/` directory.

use crate::config::error::{ConfigError, ConfigResult};
use dr_protocol::command_models::CommandSpec;
use dr_protocol::config_models::GlobalConfig;
use dr_protocol::pipeline_models::{Pipeline, StepSpec};
use dr_protocol::probe_models::ProbeTarget;
use dr_protocol::process_models::ProcessSpec;
use std::path::{Path, PathBuf};

/// Name of the pipeline `devrun build` runs when none is given.
pub const DEFAULT_PIPELINE: &str = "build";

/// Name of the pipeline `devrun setup` runs.
pub const SETUP_PIPELINE: &str = "setup";

/// A leading `$DEVRUN` argument runs this executable against the project
/// root, e.g. `["$DEVRUN", "build-info"]`.
pub const DEVRUN_PLACEHOLDER: &str = "$DEVRUN";

/// Unified application configuration loaded from `.devrun/`.
///
/// - `config.toml`: Global settings
/// - `services/*.yaml`: Supervised processes
/// - `pipelines/*.yaml`: Pipeline definitions
///
/// Every command is anchored to `root`: a missing `cwd` becomes the root and
/// a relative one is joined onto it.
///
/// # Example
///
/// ```rust,no_run
/// use dr_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} services and {} pipelines",
///          config.services.len(),
///          config.pipelines.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Absolute project root.
    pub root: PathBuf,
    pub global: GlobalConfig,
    pub services: Vec<ProcessSpec>,
    pub pipelines: Vec<Pipeline>,
}

impl AppConfig {
    /// The built-in services and build pipeline for a project at `root`.
    pub fn defaults_for(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            global: GlobalConfig::default(),
            services: default_services(),
            pipelines: vec![default_build_pipeline()],
        }
        .anchored()
    }

    /// Resolve every service and step command against `root`.
    pub fn anchored(mut self) -> Self {
        let devrun = devrun_invocation(&self.root);
        for service in &mut self.services {
            anchor_command(&mut service.command, &self.root, &devrun);
        }
        for pipeline in &mut self.pipelines {
            anchor_pipeline(pipeline, &self.root, &devrun);
        }
        self
    }

    /// Services to run. An empty `only` selects every service.
    pub fn select_services(&self, only: &[String]) -> ConfigResult<Vec<ProcessSpec>> {
        if only.is_empty() {
            return Ok(self.services.clone());
        }

        only.iter()
            .map(|name| {
                self.services
                    .iter()
                    .find(|s| s.name == *name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownName {
                        kind: "service",
                        name: name.clone(),
                        available: self.service_names().join(", "),
                    })
            })
            .collect()
    }

    pub fn pipeline(&self, name: &str) -> ConfigResult<&Pipeline> {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "pipeline",
                name: name.to_string(),
                available: self
                    .pipelines
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// The named pipeline cut down to the steps in `only`, kept in declared
    /// order. An empty `only` keeps every step.
    pub fn pipeline_with_steps(&self, name: &str, only: &[String]) -> ConfigResult<Pipeline> {
        let pipeline = self.pipeline(name)?;
        if let Some(unknown) = only
            .iter()
            .find(|wanted| !pipeline.steps.iter().any(|s| s.name == **wanted))
        {
            return Err(ConfigError::UnknownName {
                kind: "step",
                name: unknown.clone(),
                available: pipeline
                    .steps
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let mut selected = pipeline.clone();
        if !only.is_empty() {
            selected.steps.retain(|s| only.contains(&s.name));
        }
        Ok(selected)
    }

    /// The configured `setup` pipeline, or the built-in one.
    pub fn setup_pipeline(&self) -> Pipeline {
        self.pipelines
            .iter()
            .find(|p| p.name == SETUP_PIPELINE)
            .cloned()
            .unwrap_or_else(|| {
                let mut pipeline = default_setup_pipeline();
                anchor_pipeline(&mut pipeline, &self.root, &devrun_invocation(&self.root));
                pipeline
            })
    }

    /// Health endpoints of every service that declares one.
    pub fn probe_targets(&self) -> Vec<ProbeTarget> {
        self.services
            .iter()
            .filter_map(|s| {
                s.health_url
                    .as_ref()
                    .map(|url| ProbeTarget::new(s.name.clone(), url.clone()))
            })
            .collect()
    }

    fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }
}

/// What `$DEVRUN` expands to for a project at `root`.
fn devrun_invocation(root: &Path) -> Vec<String> {
    let exe = std::env::current_exe()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "devrun".to_string());
    vec![exe, "-C".to_string(), root.to_string_lossy().into_owned()]
}

fn anchor_pipeline(pipeline: &mut Pipeline, root: &Path, devrun: &[String]) {
    for step in &mut pipeline.steps {
        anchor_command(&mut step.command, root, devrun);
    }
}

fn anchor_command(command: &mut CommandSpec, root: &Path, devrun: &[String]) {
    command.cwd = Some(match command.cwd.take() {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    });
    if command.program() == Some(DEVRUN_PLACEHOLDER) {
        command.argv.splice(0..1, devrun.iter().cloned());
    }
}

/// The API server and frontend dev server.
pub fn default_services() -> Vec<ProcessSpec> {
    vec![
        ProcessSpec::new(
            "backend",
            CommandSpec::new([
                "uvicorn",
                "api-server:app",
                "--host",
                "0.0.0.0",
                "--port",
                "8000",
                "--reload",
            ]),
        )
        .with_health_url("http://localhost:8000/api/health"),
        ProcessSpec::new(
            "frontend",
            CommandSpec::new(["npm", "run", "dev", "--", "--port", "5173"]),
        )
        .with_health_url("http://localhost:5173"),
    ]
}

/// Clean, install, lint, type-check, compile, then record build info.
///
/// Steps that need a manifest are skipped when it is missing.
pub fn default_build_pipeline() -> Pipeline {
    Pipeline {
        name: DEFAULT_PIPELINE.to_string(),
        steps: vec![
            StepSpec::required("clean", CommandSpec::new([DEVRUN_PLACEHOLDER, "clean"])),
            StepSpec::required("install-npm", CommandSpec::new(["npm", "install"]))
                .only_if_exists("package.json"),
            StepSpec::optional(
                "install-python",
                CommandSpec::new(["pip", "install", "-r", "requirements.txt"]),
            )
            .only_if_exists("requirements.txt"),
            StepSpec::required("lint", CommandSpec::new(["npm", "run", "lint"]))
                .only_if_exists("package.json"),
            StepSpec::required("type-check", CommandSpec::new(["npm", "run", "type-check"]))
                .only_if_exists("tsconfig.json"),
            StepSpec::required("compile", CommandSpec::new(["npm", "run", "build"]))
                .with_timeout_secs(600),
            StepSpec::required(
                "build-info",
                CommandSpec::new([DEVRUN_PLACEHOLDER, "build-info"]),
            ),
        ],
    }
}

/// Install whatever dependencies the project declares.
pub fn default_setup_pipeline() -> Pipeline {
    Pipeline {
        name: SETUP_PIPELINE.to_string(),
        steps: vec![
            StepSpec::required("install-npm", CommandSpec::new(["npm", "install"]))
                .only_if_exists("package.json"),
            StepSpec::optional(
                "install-python",
                CommandSpec::new(["pip", "install", "-r", "requirements.txt"]),
            )
            .only_if_exists("requirements.txt"),
        ],
    }
}
