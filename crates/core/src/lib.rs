//! fwcheck-core
//!
//! Core library for firmware compliance checking: acquisition and validation
//! of firmware description tables, kernel log scanning, and the finding model
//! both report through.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends; the CLI only wires configuration and output.

pub mod checks;
pub mod config;
pub mod exec;
pub mod findings;
pub mod klog;
pub mod session;
pub mod tables;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
