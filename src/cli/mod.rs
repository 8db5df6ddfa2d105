//! Command-line driver.
//!
//! A local stand-in for the infrastructure host: it reads resource files,
//! plans them against a local state file and runs the resulting
//! operations through the [`Provider`](crate::provider::Provider).

mod commands;
mod driver;
mod manifest;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use driver::{DataOutcome, Driver, DriverPlan, RunReport, Step, StepOutcome, validate_manifest};
pub use manifest::{Manifest, ResourceBlock};
pub use output::{OutputFormatter, redact};
