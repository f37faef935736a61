//! # dr-core
//!
//! Process supervision and pipeline execution engine for devrun.
//!
//! This crate provides:
//! - A command execution primitive shared by both engines
//! - A supervisor that runs long-lived services and tears them down together
//! - A sequential, fail-fast pipeline runner
//! - Health probes and workspace inspection
//! - Configuration loading from the `.devrun/` directory
//!
//! ## Modules
//!
//! - [`exec`]: Spawning and running external commands
//! - [`supervisor`]: Process supervision state machine
//! - [`session`]: A full dev environment session
//! - [`engine`]: Pipeline execution engine
//! - [`probe`]: Health and workspace status
//! - [`preflight`]: Toolchain checks before a build
//! - [`artifacts`]: Build info and cleaning
//! - [`setup`]: First-run environment file
//! - [`config`]: Configuration loading and management
//! - [`init`]: `.devrun/` scaffolding

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod exec;
pub mod init;
pub mod preflight;
pub mod probe;
pub mod session;
pub mod setup;
pub mod supervisor;
