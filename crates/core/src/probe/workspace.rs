//! Local workspace status: build output and installed dependencies.

use std::path::Path;
use walkdir::WalkDir;

/// Directory the frontend build writes to.
pub const BUILD_OUTPUT_DIR: &str = "dist";

/// Directory npm installs dependencies into.
pub const DEPENDENCIES_DIR: &str = "node_modules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceStatus {
    /// Number of files under `dist/`, or None if nothing was built.
    pub build_output_files: Option<usize>,
    pub dependencies_installed: bool,
}

impl WorkspaceStatus {
    pub fn is_built(&self) -> bool {
        self.build_output_files.is_some()
    }
}

/// Inspect `root` for build output and installed dependencies.
pub fn workspace_status(root: &Path) -> WorkspaceStatus {
    let dist = root.join(BUILD_OUTPUT_DIR);
    let build_output_files = dist.is_dir().then(|| {
        WalkDir::new(&dist)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .count()
    });

    WorkspaceStatus {
        build_output_files,
        dependencies_installed: root.join(DEPENDENCIES_DIR).is_dir(),
    }
}
