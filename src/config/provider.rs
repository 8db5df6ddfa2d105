//! Provider configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.linode.com";

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v4";

/// Default profile name.
pub const DEFAULT_PROFILE: &str = "default";

/// Provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Bearer token for the Linode API.
    pub token: Option<String>,

    /// API base URL.
    pub url: Option<String>,

    /// API version path segment.
    pub api_version: Option<String>,

    /// Prefix prepended to the User-Agent header.
    pub ua_prefix: Option<String>,

    /// Profile store path. Defaults to `~/.config/linode`.
    pub config_path: Option<PathBuf>,

    /// Profile to read from the profile store.
    pub config_profile: Option<String>,

    /// Never power-cycle an instance implicitly.
    pub skip_implicit_reboots: bool,

    /// Skip waiting for new instances and node pools to become ready.
    pub skip_instance_ready_poll: bool,

    /// S3-protocol access key.
    pub obj_access_key: Option<String>,

    /// S3-protocol secret key.
    pub obj_secret_key: Option<String>,

    /// Mint short-lived object storage keys when none are configured.
    pub obj_use_temp_keys: bool,

    /// Delete all objects when a bucket is destroyed.
    pub obj_bucket_force_delete: bool,

    /// Event poller interval in milliseconds.
    pub event_poll_ms: u64,

    /// Event poller interval for LKE workflows in milliseconds.
    pub lke_event_poll_ms: u64,

    /// Node readiness poll interval for LKE workflows in milliseconds.
    pub lke_node_ready_poll_ms: u64,

    /// Lower bound of the retry backoff in milliseconds.
    pub min_retry_delay_ms: u64,

    /// Upper bound of the retry backoff in milliseconds.
    pub max_retry_delay_ms: u64,

    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,

    /// Maximum attempts for a retryable request.
    pub max_retries: u32,

    /// Explicitly overwrite `id` after create and fill unknown planned
    /// values from the prior state after update.
    pub empty_id_workaround: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token: None,
            url: None,
            api_version: None,
            ua_prefix: None,
            config_path: None,
            config_profile: None,
            skip_implicit_reboots: false,
            skip_instance_ready_poll: false,
            obj_access_key: None,
            obj_secret_key: None,
            obj_use_temp_keys: false,
            obj_bucket_force_delete: false,
            event_poll_ms: 300,
            lke_event_poll_ms: 3000,
            lke_node_ready_poll_ms: 3000,
            min_retry_delay_ms: 100,
            max_retry_delay_ms: 2000,
            http_timeout_secs: 60,
            max_retries: 5,
            empty_id_workaround: true,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "(sensitive value)");
        f.debug_struct("ProviderConfig")
            .field("token", &redact(&self.token))
            .field("url", &self.url)
            .field("api_version", &self.api_version)
            .field("ua_prefix", &self.ua_prefix)
            .field("config_path", &self.config_path)
            .field("config_profile", &self.config_profile)
            .field("skip_implicit_reboots", &self.skip_implicit_reboots)
            .field("skip_instance_ready_poll", &self.skip_instance_ready_poll)
            .field("obj_access_key", &redact(&self.obj_access_key))
            .field("obj_secret_key", &redact(&self.obj_secret_key))
            .field("obj_use_temp_keys", &self.obj_use_temp_keys)
            .field("obj_bucket_force_delete", &self.obj_bucket_force_delete)
            .field("event_poll_ms", &self.event_poll_ms)
            .field("lke_event_poll_ms", &self.lke_event_poll_ms)
            .field("lke_node_ready_poll_ms", &self.lke_node_ready_poll_ms)
            .field("min_retry_delay_ms", &self.min_retry_delay_ms)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("empty_id_workaround", &self.empty_id_workaround)
            .finish()
    }
}

impl ProviderConfig {
    /// Effective API base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Effective API version.
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    /// Effective profile name.
    #[must_use]
    pub fn profile(&self) -> &str {
        self.config_profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }

    /// Event poller interval.
    #[must_use]
    pub const fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms)
    }

    /// LKE event poller interval.
    #[must_use]
    pub const fn lke_event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lke_event_poll_ms)
    }

    /// LKE node readiness interval.
    #[must_use]
    pub const fn lke_node_ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lke_node_ready_poll_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_url();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::validation(
                format!("url must start with http:// or https://, got {url:?}"),
                "url",
            )
            .into());
        }

        if self.api_version().is_empty() || self.api_version().contains('/') {
            return Err(ConfigError::validation(
                "api_version must be a single path segment such as v4",
                "api_version",
            )
            .into());
        }

        if self.min_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ConfigError::validation(
                format!(
                    "min_retry_delay_ms ({}) must not exceed max_retry_delay_ms ({})",
                    self.min_retry_delay_ms, self.max_retry_delay_ms
                ),
                "min_retry_delay_ms",
            )
            .into());
        }

        for (field, value) in [
            ("event_poll_ms", self.event_poll_ms),
            ("lke_event_poll_ms", self.lke_event_poll_ms),
            ("lke_node_ready_poll_ms", self.lke_node_ready_poll_ms),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::validation(format!("{field} must be positive"), field).into());
            }
        }

        if self.max_retries == 0 {
            return Err(ConfigError::validation("max_retries must be at least 1", "max_retries").into());
        }

        if self.obj_access_key.is_some() != self.obj_secret_key.is_some() {
            return Err(ConfigError::validation(
                "obj_access_key and obj_secret_key must be set together",
                "obj_access_key",
            )
            .into());
        }

        if self.token.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingToken.into());
        }

        Ok(())
    }
}
