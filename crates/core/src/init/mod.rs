//! Initialization module for creating `.devrun` directory structures.
//!
//! Generates a `.devrun/` directory with pre-configured templates for:
//! - Global configuration (`config.toml`)
//! - Supervised services (`services/*.yaml`)
//! - Pipelines (`pipelines/*.yaml`)
//!
//! # Example
//!
//! ```no_run
//! use dr_core::init::{InitOptions, generate_devrun_structure};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//!     minimal: false,
//! };
//!
//! let written = generate_devrun_structure(options).await?;
//! println!("Wrote {} files", written.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_devrun_structure, InitOptions};
pub use templates::{get_template, list_templates};
