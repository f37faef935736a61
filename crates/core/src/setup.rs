//! First-run project setup.

use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment file read by the services.
pub const ENV_FILE: &str = ".env";

/// Template copied to [`ENV_FILE`] when it is missing.
pub const ENV_TEMPLATE: &str = ".env.example";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFile {
    /// `.env` was copied from `.env.example`.
    Created(PathBuf),
    AlreadyPresent,
    /// Neither file exists.
    NoTemplate,
}

/// Create `.env` under `root` from `.env.example` unless it already exists.
/// An existing `.env` is never touched.
pub fn ensure_env_file(root: &Path) -> io::Result<EnvFile> {
    let target = root.join(ENV_FILE);
    if target.exists() {
        return Ok(EnvFile::AlreadyPresent);
    }

    let template = root.join(ENV_TEMPLATE);
    if !template.is_file() {
        return Ok(EnvFile::NoTemplate);
    }

    std::fs::copy(&template, &target)?;
    info!(path = %target.display(), "created environment file");
    Ok(EnvFile::Created(target))
}
