//! Directory structure and file generation for `.devrun` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for initializing a `.devrun` directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where `.devrun` will be created.
    pub target_dir: PathBuf,

    /// Overwrite an existing `.devrun` directory.
    pub force: bool,

    /// Only write `config.toml` and the service definitions; the built-in
    /// build pipeline is used until one is added.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate a `.devrun` directory structure with templates.
///
/// ```text
/// .devrun/
/// ├── config.toml
/// ├── services/
/// │   ├── backend.yaml
/// │   └── frontend.yaml
/// └── pipelines/ (unless minimal)
///     ├── build.yaml
///     └── setup.yaml
/// ```
///
/// Returns the written files in creation order.
///
/// # Errors
///
/// - [`InitError::DirectoryExists`] if `.devrun` exists and `force` is unset
/// - [`InitError::TemplateNotFound`] if an embedded template is missing
/// - I/O errors from creating directories or writing files
pub async fn generate_devrun_structure(options: InitOptions) -> InitResult<Vec<PathBuf>> {
    let dr_dir = options.target_dir.join(CONFIG_DIR);

    if dr_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(dr_dir));
    }

    let mut templates = vec!["config.toml".to_string()];
    templates.extend(list_templates("services/"));
    if !options.minimal {
        templates.extend(list_templates("pipelines/"));
    }

    let mut written = Vec::with_capacity(templates.len());
    for template in &templates {
        written.push(write_template_file(&dr_dir, template)?);
    }

    info!(path = %dr_dir.display(), files = written.len(), "initialized devrun config");
    Ok(written)
}

fn write_template_file(dr_dir: &Path, template_path: &str) -> InitResult<PathBuf> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = dr_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path.clone(),
        source,
    })?;

    Ok(target_path)
}
