//! Common test utilities shared by the integration tests.
//!
//! - Fixtures: shell-backed process and step specs, sample projects
//! - Assertions and event collection helpers

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
