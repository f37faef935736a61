//! Embedded template files for `.devrun` initialization.
//!
//! Templates live in the crate's `templates/` directory and are compiled into
//! the binary with `rust-embed`, so `devrun init` works from any directory.
//! With the `debug-embed` feature they are embedded in debug builds too.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/templates"]
pub struct TemplateAssets;

/// Get template file content by path relative to the templates root
/// (e.g. `"config.toml"`, `"services/backend.yaml"`).
///
/// # Example
/// ```
/// use dr_core::init::templates::get_template;
///
/// let config = get_template("config.toml").expect("config.toml should exist");
/// assert!(config.contains("shutdown_timeout_secs"));
/// ```
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
}

/// List template paths under `prefix` (e.g. `"services/"`), sorted.
pub fn list_templates(prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect();
    paths.sort();
    paths
}
