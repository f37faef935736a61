//! Error types for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The project root could not be made absolute.
    #[error("Invalid project root {}: {source}", .path.display())]
    InvalidRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a configuration file from disk.
    #[error("Failed to read config file at {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML file at {}: {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse YAML file at {}: {source}", .path.display())]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Failed to walk directory structure.
    #[error("Failed to traverse directory {}: {source}", .path.display())]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration in {}: {reason}", .path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    /// Two services or two pipelines share a name.
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    /// A name given on the command line matches nothing configured.
    #[error("Unknown {kind} '{name}' (available: {available})")]
    UnknownName {
        kind: &'static str,
        name: String,
        available: String,
    },
}

/// Type alias for Result with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
