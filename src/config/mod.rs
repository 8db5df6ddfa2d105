//! Configuration module for the Linode provider.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `linode-provider.yaml`
//! - Reading the Linode CLI profile store
//! - Applying `LINODE_*` environment overrides
//! - Validation of configuration values

mod parser;
mod profile;
mod provider;

pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use profile::{Profile, ProfileStore};
pub use provider::{DEFAULT_API_URL, DEFAULT_API_VERSION, DEFAULT_PROFILE, ProviderConfig};
