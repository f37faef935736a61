//! Build artifacts: the build-info file and cleaning generated output.

use crate::exec::{self, OutputMode, RunOptions};
use anyhow::{Context, Result};
use chrono::Local;
use dr_protocol::command_models::CommandSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Default location of the build-info file, relative to the project root.
pub const DEFAULT_BUILD_INFO_PATH: &str = "dist/build-info.json";

/// Paths removed by [`clean`] when no explicit list is given.
pub const DEFAULT_CLEAN_PATHS: &[&str] = &["dist", "build", "node_modules/.cache"];

/// Directories never searched for Python caches.
const UNSEARCHED_DIRS: &[&str] = &["node_modules", ".git"];

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Refusing to clean '{}': path is outside the project root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("Failed to remove '{}': {source}", .path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Contents of `build-info.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub build_date: String,
    pub git_commit: String,
    pub git_branch: String,
}

impl BuildInfo {
    /// Collect build information for the repository at `root`.
    ///
    /// Git fields are empty strings when git is unavailable or `root` is not
    /// a repository.
    pub async fn collect(root: &Path, version: &str) -> Self {
        Self {
            version: version.to_string(),
            build_date: Local::now().to_rfc3339(),
            git_commit: git_output(root, &["rev-parse", "HEAD"]).await,
            git_branch: git_output(root, &["rev-parse", "--abbrev-ref", "HEAD"]).await,
        }
    }
}

async fn git_output(root: &Path, args: &[&str]) -> String {
    let mut argv = vec!["git".to_string()];
    argv.extend(args.iter().map(|arg| (*arg).to_string()));
    let spec = CommandSpec::new(argv).with_cwd(root);
    let options = RunOptions::unchecked().with_output(OutputMode::Capture);

    match exec::run(&spec, &options).await {
        Ok(output) if output.success() => output.stdout.trim().to_string(),
        Ok(_) => String::new(),
        Err(e) => {
            debug!(error = %e, "git unavailable");
            String::new()
        }
    }
}

/// Write `build-info.json` under `root`.
///
/// The file is only written when its parent directory already exists, i.e.
/// after a build produced output. Returns the written path, or None when
/// the write was skipped.
pub async fn generate_build_info(root: &Path, output: &Path, version: &str) -> Result<Option<PathBuf>> {
    let path = root.join(output);
    let parent_exists = path.parent().is_some_and(Path::is_dir);
    if !parent_exists {
        info!(path = %path.display(), "no build output directory, skipping build info");
        return Ok(None);
    }

    let build_info = BuildInfo::collect(root, version).await;
    let json = serde_json::to_string_pretty(&build_info).context("Failed to serialize build info")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), commit = %build_info.git_commit, "wrote build info");
    Ok(Some(path))
}

/// Remove generated paths under `root`, returning those that existed.
///
/// Paths must be relative and stay inside `root`.
pub fn clean(root: &Path, paths: &[&str]) -> Result<Vec<PathBuf>, ArtifactError> {
    let mut removed = Vec::new();

    for relative in paths {
        let relative = Path::new(relative);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ArtifactError::OutsideRoot(relative.to_path_buf()));
        }

        let path = root.join(relative);
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else if path.exists() {
            std::fs::remove_file(&path)
        } else {
            continue;
        };

        result.map_err(|source| ArtifactError::Remove {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "removed");
        removed.push(path);
    }

    Ok(removed)
}

/// Remove the default build output and every Python bytecode cache under
/// `root`.
pub fn clean_workspace(root: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    let mut removed = clean(root, DEFAULT_CLEAN_PATHS)?;
    removed.extend(clean_python_caches(root)?);
    Ok(removed)
}

/// Remove `__pycache__` directories and stray `*.pyc` files under `root`.
/// Unreadable directories are skipped.
pub fn clean_python_caches(root: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    let mut removed = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        let name = entry.file_name();
        let path = entry.path();

        let result = if entry.file_type().is_dir() {
            if UNSEARCHED_DIRS.iter().any(|dir| name == *dir) {
                walker.skip_current_dir();
                continue;
            }
            if name != "__pycache__" {
                continue;
            }
            walker.skip_current_dir();
            std::fs::remove_dir_all(path)
        } else if path.extension().is_some_and(|ext| ext == "pyc") {
            std::fs::remove_file(path)
        } else {
            continue;
        };

        result.map_err(|source| ArtifactError::Remove {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "removed");
        removed.push(path.to_path_buf());
    }

    if !removed.is_empty() {
        info!(count = removed.len(), "removed python caches");
    }
    Ok(removed)
}
