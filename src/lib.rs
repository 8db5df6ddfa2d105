// ============================================================================
// Linting
// ============================================================================

#![warn(missing_docs)]
#![warn(unused_must_use)]
#![warn(nonstandard_style)]

// Clippy lints
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::cognitive_complexity)]
#![allow(clippy::module_name_repetitions)]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Linode Provider
//!
//! The engine of an infrastructure-as-code provider for Linode: typed
//! attribute values, schema-driven planning, an HTTP client for the Linode
//! API, event pollers, and reconcilers that drive remote objects towards
//! their declared state.
//!
//! ## Architecture
//!
//! A host hands the [`Provider`] a resource type name plus JSON documents:
//!
//! 1. **Plan**: the configuration is checked against the resource
//!    [`ResourceSchema`](framework::ResourceSchema), defaults and prior
//!    values are folded in, and values only the server knows are marked
//!    unknown.
//! 2. **Apply**: the matching [`Resource`](provider::Resource) issues API
//!    calls, waits on account events or status polls, and returns the new
//!    state.
//! 3. **Read**: the stored state is refreshed; vanished objects are dropped
//!    with a warning.
//!
//! Problems are reported as [`Diagnostics`](framework::Diagnostics) rather
//! than aborting the host.
//!
//! ## Modules
//!
//! - [`framework`]: tri-state values, schemas, plan modifiers, diagnostics
//! - [`linode`]: API client, typed endpoints, event and status pollers
//! - [`provider`]: provider meta, operation contexts, handler registry
//! - [`resources`] / [`datasources`]: the managed Linode object kinds
//! - [`config`]: provider configuration, profile store, environment
//! - [`state`] / [`cli`]: the local command-line driver and its state file
//!
//! ## Example
//!
//! ```yaml
//! resources:
//!   - type: linode_domain
//!     name: main
//!     config:
//!       domain: example.com
//!       type: master
//!       soa_email: admin@example.com
//!       ttl_sec: 300
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod datasources;
pub mod error;
pub mod framework;
pub mod linode;
pub mod provider;
pub mod resources;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, Driver, Manifest, OutputFormatter};
pub use config::{ConfigParser, ProviderConfig};
pub use error::{ProviderError, Result};
pub use framework::{Diagnostics, PlanAction, Planner, ResourcePlan, Value};
pub use linode::LinodeClient;
pub use provider::{OpContext, Provider, ProviderMeta, Registry};
pub use state::{LocalStateStore, ProviderState, StateStore};
