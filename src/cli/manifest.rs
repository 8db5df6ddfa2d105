//! Resource files read by the driver.
//!
//! ```yaml
//! resources:
//!   - type: linode_domain
//!     name: main
//!     config:
//!       domain: example.com
//!       type: master
//!       soa_email: admin@example.com
//! data:
//!   - type: linode_domain
//!     name: existing
//!     config:
//!       domain: other.example.com
//! ```

use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::state::address;

/// One resource or data source instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceBlock {
    /// Registered type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Instance name, unique per type.
    pub name: String,
    /// Attribute values.
    #[serde(default = "empty_object")]
    pub config: Json,
}

fn empty_object() -> Json {
    Json::Object(serde_json::Map::new())
}

impl ResourceBlock {
    /// `{type}.{name}`.
    #[must_use]
    pub fn address(&self) -> String {
        address(&self.type_name, &self.name)
    }
}

/// Contents of a resource file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Managed resources, applied in order.
    #[serde(default)]
    pub resources: Vec<ResourceBlock>,
    /// Data sources, read before any resource is planned.
    #[serde(default)]
    pub data: Vec<ResourceBlock>,
}

impl Manifest {
    /// Reads and checks a resource file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not valid YAML, or
    /// declares the same address twice.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        debug!("Loading resource file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parses resource file content; `source` names it in errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is invalid.
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let manifest: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::parse(e.to_string(), source))?;
        manifest.check(source)?;
        Ok(manifest)
    }

    fn check(&self, source: &str) -> Result<()> {
        let mut seen = BTreeSet::new();
        for block in &self.resources {
            if !block.config.is_object() {
                return Err(ConfigError::parse(
                    format!("config of {} must be a mapping", block.address()),
                    source,
                )
                .into());
            }
            if !seen.insert(block.address()) {
                return Err(ConfigError::parse(format!("{} is declared twice", block.address()), source).into());
            }
        }

        seen.clear();
        for block in &self.data {
            if !seen.insert(block.address()) {
                return Err(ConfigError::parse(
                    format!("data source {} is declared twice", block.address()),
                    source,
                )
                .into());
            }
        }
        Ok(())
    }

    /// Looks up a resource block by address.
    #[must_use]
    pub fn resource(&self, address: &str) -> Option<&ResourceBlock> {
        self.resources.iter().find(|b| b.address() == address)
    }
}
