//! Error types for the Linode provider.
//!
//! This module provides the error hierarchy for every layer of the provider:
//! configuration, the Linode API client, reconciliation, and the local state
//! store used by the command-line driver.

use std::path::PathBuf;
use thiserror::Error;

/// Suffix appended to errors caused by a broken internal invariant.
pub const PROVIDER_ISSUE: &str = "This is always a provider issue.";

/// The main error type for the Linode provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Linode API errors.
    #[error("Linode API error: {0}")]
    Api(#[from] ApiError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The requested profile does not exist in the profile store.
    #[error("Profile {profile} not found in {path}")]
    ProfileNotFound {
        /// Requested profile name.
        profile: String,
        /// Profile store path.
        path: PathBuf,
    },

    /// No API token could be resolved.
    #[error("A Linode API token is required (set `token`, LINODE_TOKEN, or a profile)")]
    MissingToken,
}

/// Linode API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed entity does not exist (HTTP 404).
    #[error("Not found: {path}")]
    NotFound {
        /// Request path that returned 404.
        path: String,
    },

    /// Authentication failed.
    #[error("Linode authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The server rejected the request.
    #[error("[{status}] {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message returned by the API, verbatim.
        message: String,
    },

    /// Rate limited.
    #[error("Linode API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// A retryable failure persisted after the retry budget was spent.
    #[error("Transient API failure after {attempts} attempts, please retry: {message}")]
    Transient {
        /// Number of attempts made.
        attempts: u32,
        /// Last observed failure.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with Linode: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Linode API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// An operation did not finish before its deadline.
    #[error("Timed out waiting for {operation}")]
    Timeout {
        /// Description of what was being awaited.
        operation: String,
    },

    /// An awaited event finished with a failed status.
    #[error("Event {event_id} ({action}) failed for entity {entity_id}")]
    EventFailed {
        /// Event id.
        event_id: i64,
        /// Event action.
        action: String,
        /// Primary entity id.
        entity_id: i64,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// An internal invariant was violated.
    #[error("{message} {PROVIDER_ISSUE}")]
    ProviderBug {
        /// Description of the broken invariant.
        message: String,
    },

    /// The requested operation needs an implicit reboot that was disabled.
    #[error(
        "Linode {linode_id} must be powered off to {action}, but implicit reboots are disabled \
         (skip_implicit_reboots). Power off the instance manually and retry."
    )]
    RebootRequired {
        /// Instance id.
        linode_id: i64,
        /// What was being attempted.
        action: String,
    },

    /// Object storage credentials could not be resolved.
    #[error("{message}")]
    MissingCredentials {
        /// Description of what was missing.
        message: String,
    },

    /// An S3-protocol request failed.
    #[error("Object storage request failed: {message}")]
    ObjectStorage {
        /// Description of the failure.
        message: String,
    },

    /// The referenced resource type is not registered.
    #[error("Unknown resource type: {name}")]
    UnknownResource {
        /// Requested type name.
        name: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State write failed.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is a 404 from the API.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(ApiError::NotFound { .. }))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Api(api) => api.is_retryable(),
            Self::State(StateError::LockFailed { .. }) => true,
            _ => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Api(ApiError::Network { .. }) => Some(5),
            Self::State(StateError::LockFailed { .. }) => Some(2),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error attributed to a file.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl ApiError {
    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Returns true if the API reported 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the request may succeed when repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::Rejected { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

impl ReconcileError {
    /// Creates a provider bug error.
    #[must_use]
    pub fn provider_bug(message: impl Into<String>) -> Self {
        Self::ProviderBug {
            message: message.into(),
        }
    }

    /// Creates an object storage error.
    #[must_use]
    pub fn object_storage(message: impl Into<String>) -> Self {
        Self::ObjectStorage {
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

/// Returns true for HTTP statuses the client retries: 408, 429 and 5xx.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (status >= 500 && status <= 599)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(408));
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(409));
    }

    #[test]
    fn test_provider_bug_carries_tag() {
        let err = ReconcileError::provider_bug("node pool count is zero");
        assert_eq!(
            err.to_string(),
            "node pool count is zero This is always a provider issue."
        );
    }

    #[test]
    fn test_not_found_detection() {
        let err = ProviderError::from(ApiError::NotFound {
            path: String::from("linode/instances/1"),
        });
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let err = ProviderError::from(ApiError::network("reset"));
        assert!(!err.is_not_found());
        assert_eq!(err.retry_delay_secs(), Some(5));
    }

    #[test]
    fn test_rejected_message_is_verbatim() {
        let err = ApiError::rejected(400, "label: Label must be unique");
        assert_eq!(err.to_string(), "[400] label: Label must be unique");
    }
}
