//! # dr-protocol
//!
//! Core protocol definitions and data models for devrun.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (YAML services and pipelines, TOML config)
//! - Supervised process and pipeline run state
//! - Communication between the engines in `dr-core` and the CLI
//!
//! ## Modules
//!
//! - [`command_models`]: External command descriptors
//! - [`config_models`]: Global configuration from config.toml
//! - [`process_models`]: Managed process definitions, states and shutdown reasons
//! - [`pipeline_models`]: Pipeline definitions, step outcomes and run results
//! - [`probe_models`]: Health probe targets and outcomes
//! - [`ipc`]: Control operations and progress events
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, uuid and chrono
//! - Independent compilation: No dependencies on other devrun crates

pub mod command_models;
pub mod config_models;
pub mod ipc;
pub mod pipeline_models;
pub mod probe_models;
pub mod process_models;

// Re-export all public types for convenience
pub use command_models::*;
pub use config_models::*;
pub use ipc::*;
pub use pipeline_models::*;
pub use probe_models::*;
pub use process_models::*;
