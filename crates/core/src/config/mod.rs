//! Configuration loading and management.
//!
//! This module loads the `.devrun/` directory structure and supplies the
//! built-in services and build pipeline when it is absent.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, CONFIG_DIR};
pub use models::{AppConfig, DEFAULT_PIPELINE, DEVRUN_PLACEHOLDER, SETUP_PIPELINE};
