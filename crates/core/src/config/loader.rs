//! Configuration file loader for the `.devrun/` directory structure.
//!
//! - `config.toml`: Global settings
//! - `services/*.yaml`: Supervised process definitions
//! - `pipelines/*.yaml`: Pipeline definitions
//!
//! Anything missing falls back to the built-in defaults from
//! [`crate::config::models`]. Every loaded command is anchored to the
//! absolute project root.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::{default_build_pipeline, default_services, AppConfig};
use dr_protocol::config_models::GlobalConfig;
use dr_protocol::pipeline_models::Pipeline;
use dr_protocol::process_models::ProcessSpec;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Name of the configuration directory under the project root.
pub const CONFIG_DIR: &str = ".devrun";

/// A parsed config file and where it came from.
type Loaded<T> = Vec<(PathBuf, T)>;

/// Loads all configuration from the `.devrun/` directory under `root`.
///
/// A missing `.devrun/` directory, `config.toml`, `services/` or
/// `pipelines/` yields the corresponding defaults rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `root` cannot be made absolute
/// - Files exist but cannot be read
/// - Files have invalid TOML or YAML syntax
/// - A service or pipeline step has an empty command
/// - Two services or two pipelines share a name
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let root = std::path::absolute(root).map_err(|source| ConfigError::InvalidRoot {
        path: root.to_path_buf(),
        source,
    })?;
    let dr_dir = root.join(CONFIG_DIR);

    if !dr_dir.exists() {
        debug!(path = %dr_dir.display(), "no config directory, using defaults");
        return Ok(AppConfig::defaults_for(root));
    }

    let global = load_global_config(&dr_dir)?;

    let services = match load_yaml_dir::<ProcessSpec>(&dr_dir.join("services"))? {
        Some(loaded) => validate_services(loaded)?,
        None => default_services(),
    };

    let pipelines = match load_yaml_dir::<Pipeline>(&dr_dir.join("pipelines"))? {
        Some(loaded) => validate_pipelines(loaded)?,
        None => vec![default_build_pipeline()],
    };

    Ok(AppConfig {
        root,
        global,
        services,
        pipelines,
    }
    .anchored())
}

/// Loads global configuration from `config.toml`.
fn load_global_config(dr_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = dr_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path,
        source,
    })
}

/// Loads every `.yaml`/`.yml` file directly inside `dir`, in file name order.
///
/// Returns None when the directory does not exist.
fn load_yaml_dir<T: DeserializeOwned>(dir: &Path) -> ConfigResult<Option<Loaded<T>>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut items = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = entry.path();

        // Only process .yaml and .yml files
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let item: T = serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "loaded config file");
        items.push((path.to_path_buf(), item));
    }

    Ok(Some(items))
}

fn validate_services(loaded: Loaded<ProcessSpec>) -> ConfigResult<Vec<ProcessSpec>> {
    let mut seen = HashSet::new();
    let mut services = Vec::with_capacity(loaded.len());

    for (path, service) in loaded {
        if service.command.program().is_none() {
            return Err(ConfigError::InvalidConfig {
                path,
                reason: format!("service '{}' has an empty command", service.name),
            });
        }
        if !seen.insert(service.name.clone()) {
            return Err(ConfigError::DuplicateName {
                kind: "service",
                name: service.name,
            });
        }
        services.push(service);
    }

    Ok(services)
}

fn validate_pipelines(loaded: Loaded<Pipeline>) -> ConfigResult<Vec<Pipeline>> {
    let mut seen = HashSet::new();
    let mut pipelines = Vec::with_capacity(loaded.len());

    for (path, pipeline) in loaded {
        if let Some(step) = pipeline.steps.iter().find(|s| s.command.program().is_none()) {
            return Err(ConfigError::InvalidConfig {
                path,
                reason: format!(
                    "step '{}' of pipeline '{}' has an empty command",
                    step.name, pipeline.name
                ),
            });
        }
        if !seen.insert(pipeline.name.clone()) {
            return Err(ConfigError::DuplicateName {
                kind: "pipeline",
                name: pipeline.name,
            });
        }
        pipelines.push(pipeline);
    }

    Ok(pipelines)
}
