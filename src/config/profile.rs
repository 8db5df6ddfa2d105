//! Reader for the Linode CLI profile store.
//!
//! The store is an INI file: `[section]` headers name profiles, `key = value`
//! lines hold settings, and a `[DEFAULT]` section supplies fallbacks.
//! Comments start with `#` or `;`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Name of the fallback section.
const DEFAULT_SECTION: &str = "DEFAULT";

/// Settings of one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// API token.
    pub token: Option<String>,
    /// API base URL.
    pub api_url: Option<String>,
    /// API version.
    pub api_version: Option<String>,
}

/// Parsed profile store.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    path: PathBuf,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ProfileStore {
    /// Default store location, `~/.config/linode`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("linode"))
    }

    /// Loads a store from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading profile store: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string()))?;

        Self::parse(&content, path)
    }

    /// Parses store content.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first malformed line.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (number, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let location = format!("{}:{}", path.display(), number + 1);

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(
                    ConfigError::parse(format!("{location}: expected key = value, got {line:?}"), location).into(),
                );
            };

            let Some(section) = current.as_ref() else {
                return Err(
                    ConfigError::parse(format!("{location}: setting outside of a [profile] section"), location)
                        .into(),
                );
            };

            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    /// Profile names, excluding the fallback section.
    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.sections
            .keys()
            .map(String::as_str)
            .filter(|name| *name != DEFAULT_SECTION)
    }

    /// Resolves a profile, falling back to `[DEFAULT]` per key.
    ///
    /// # Errors
    ///
    /// Returns an error if neither the profile nor a fallback exists.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        let section = self.sections.get(name);
        let fallback = self.sections.get(DEFAULT_SECTION);

        if section.is_none() && (fallback.is_none() || name != super::provider::DEFAULT_PROFILE) {
            return Err(ConfigError::ProfileNotFound {
                profile: name.to_string(),
                path: self.path.clone(),
            }
            .into());
        }

        let lookup = |key: &str| {
            section
                .and_then(|s| s.get(key))
                .or_else(|| fallback.and_then(|s| s.get(key)))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        Ok(Profile {
            token: lookup("token"),
            api_url: lookup("api_url"),
            api_version: lookup("api_version"),
        })
    }
}
