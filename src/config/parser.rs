//! Configuration parser for loading provider configuration.
//!
//! Values come from, in increasing precedence: the YAML file, the profile
//! store (only for fields the file left unset), and environment variables.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, ProviderError, Result};

use super::profile::ProfileStore;
use super::provider::ProviderConfig;

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["linode-provider.yaml", "linode-provider.yml"];

/// Configuration parser for loading provider configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ProviderError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProviderConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(ProviderConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ProviderError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })
    }

    /// Loads a file (or defaults when `path` is `None`), then applies the
    /// profile store and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an explicitly requested profile
    /// cannot be loaded.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<ProviderConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => ProviderConfig::default(),
        };

        Self::apply_env_overrides(&mut config);
        Self::apply_profile(&mut config)?;

        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(config: &mut ProviderConfig) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(token) = var("LINODE_TOKEN") {
            debug!("Overriding token from environment");
            config.token = Some(token);
        }

        if let Some(url) = var("LINODE_URL") {
            debug!("Overriding url from environment");
            config.url = Some(url);
        }

        if let Some(version) = var("LINODE_API_VERSION") {
            debug!("Overriding api_version from environment");
            config.api_version = Some(version);
        }

        if let Some(path) = var("LINODE_CONFIG") {
            debug!("Overriding config_path from environment");
            config.config_path = Some(PathBuf::from(path));
        }

        if let Some(profile) = var("LINODE_PROFILE") {
            debug!("Overriding config_profile from environment");
            config.config_profile = Some(profile);
        }

        if let Some(prefix) = var("LINODE_UA_PREFIX") {
            config.ua_prefix = Some(prefix);
        }

        if let Some(key) = var("LINODE_OBJ_ACCESS_KEY") {
            config.obj_access_key = Some(key);
        }

        if let Some(key) = var("LINODE_OBJ_SECRET_KEY") {
            config.obj_secret_key = Some(key);
        }
    }

    /// Fills unset token, URL and version from the profile store.
    ///
    /// A missing store is only an error when a path or profile was set
    /// explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly configured store or profile cannot
    /// be read.
    pub fn apply_profile(config: &mut ProviderConfig) -> Result<()> {
        let explicit = config.config_path.is_some() || config.config_profile.is_some();

        let Some(path) = config.config_path.clone().or_else(ProfileStore::default_path) else {
            return Ok(());
        };

        if !path.exists() && !explicit {
            debug!("No profile store at {}", path.display());
            return Ok(());
        }

        let store = match ProfileStore::load(&path) {
            Ok(store) => store,
            Err(e) if explicit => return Err(e),
            Err(e) => {
                debug!("Ignoring unreadable profile store: {e}");
                return Ok(());
            }
        };

        let profile = match store.profile(config.profile()) {
            Ok(profile) => profile,
            Err(e) if explicit => return Err(e),
            Err(_) => return Ok(()),
        };

        info!("Using profile {:?} from {}", config.profile(), path.display());

        if config.token.is_none() {
            config.token = profile.token;
        }
        if config.url.is_none() {
            config.url = profile.api_url;
        }
        if config.api_version.is_none() {
            config.api_version = profile.api_version;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ProviderError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds a configuration file in `start` or its parent directories.
#[must_use]
pub fn find_config_file(start: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = Some(start.as_ref().to_path_buf());

    while let Some(dir) = current {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.join(name);
            if candidate.exists() {
                debug!("Found configuration file: {}", candidate.display());
                return Some(candidate);
            }
        }
        current = dir.parent().map(Path::to_path_buf);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_yaml() {
        let yaml = r"
token: abc
skip_implicit_reboots: true
event_poll_ms: 50
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parse");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.skip_implicit_reboots);
        assert_eq!(config.event_poll_ms, 50);
        assert_eq!(config.max_retry_delay_ms, 2000);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigParser::new().parse_yaml("tokn: abc\n", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ConfigParser::new().parse_yaml("  \n", None).expect("parse");
        assert_eq!(config.event_poll_ms, 300);
    }

    #[test]
    fn test_profile_fills_unset_fields() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = temp.path().join("linode");
        std::fs::write(&store, "[ops]\ntoken = from-profile\napi_version = v4beta\n").expect("write");

        let mut config = ProviderConfig {
            config_path: Some(store),
            config_profile: Some(String::from("ops")),
            api_version: Some(String::from("v4")),
            ..ProviderConfig::default()
        };
        ConfigParser::apply_profile(&mut config).expect("profile");

        assert_eq!(config.token.as_deref(), Some("from-profile"));
        assert_eq!(config.api_version.as_deref(), Some("v4"));
    }

    #[test]
    fn test_explicit_missing_profile_fails() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = temp.path().join("linode");
        std::fs::write(&store, "[ops]\ntoken = x\n").expect("write");

        let mut config = ProviderConfig {
            config_path: Some(store),
            config_profile: Some(String::from("missing")),
            ..ProviderConfig::default()
        };
        assert!(ConfigParser::apply_profile(&mut config).is_err());
    }

    #[test]
    fn test_load_file_and_find() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("linode-provider.yaml");
        std::fs::write(&path, "token: t\nurl: http://localhost:8080\n").expect("write");

        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        assert_eq!(find_config_file(&nested), Some(path.clone()));

        let config = ConfigParser::new().load_file(&path).expect("load");
        assert_eq!(config.api_url(), "http://localhost:8080");
        assert!(ConfigParser::new().load_file(temp.path().join("nope.yaml")).is_err());
    }
}
