//! State types recorded by the command-line driver.
//!
//! Each managed resource instance is stored under its address
//! (`{type}.{name}`) together with the state JSON returned by its handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1";

/// Entries kept in the history.
const MAX_HISTORY: usize = 100;

/// Everything the driver has applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderState {
    /// State format version.
    pub version: String,
    /// Records by address.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent operations, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// One managed resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource type name, e.g. `linode_domain`.
    pub type_name: String,
    /// Instance name chosen in the resource file.
    pub name: String,
    /// State returned by the handler.
    pub state: Json,
    /// Hash of the configuration last applied.
    pub config_hash: String,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

/// A single entry in the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the operation ran.
    pub timestamp: DateTime<Utc>,
    /// Operation kind.
    pub operation: StateOperation,
    /// Affected address.
    pub address: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message of a failed operation.
    #[serde(default)]
    pub error: Option<String>,
}

/// Operations recorded in the history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateOperation {
    /// Resource created.
    Create,
    /// Resource updated in place.
    Update,
    /// Resource destroyed and created again.
    Replace,
    /// State refreshed from the API.
    Refresh,
    /// Resource destroyed.
    Delete,
}

/// Address of a resource instance.
#[must_use]
pub fn address(type_name: &str, name: &str) -> String {
    format!("{type_name}.{name}")
}

/// Hex SHA-256 of a configuration.
#[must_use]
pub fn config_hash(config: &Json) -> String {
    hex::encode(Sha256::digest(config.to_string().as_bytes()))
}

impl ProviderState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a record by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&ResourceRecord> {
        self.resources.get(address)
    }

    /// Stores the state of a resource instance, keeping its creation time.
    pub fn set(&mut self, type_name: &str, name: &str, state: Json, config: &Json) {
        let now = Utc::now();
        let key = address(type_name, name);
        let created_at = self.resources.get(&key).map_or(now, |r| r.created_at);
        self.resources.insert(
            key,
            ResourceRecord {
                type_name: type_name.to_string(),
                name: name.to_string(),
                state,
                config_hash: config_hash(config),
                created_at,
                updated_at: now,
            },
        );
        self.last_updated = now;
    }

    /// Replaces the state of an existing record without touching its
    /// configuration hash. Returns false if there is no such record.
    pub fn refresh(&mut self, address: &str, state: Json) -> bool {
        let Some(record) = self.resources.get_mut(address) else {
            return false;
        };
        record.state = state;
        record.updated_at = Utc::now();
        self.last_updated = record.updated_at;
        true
    }

    /// Removes a record.
    pub fn remove(&mut self, address: &str) -> Option<ResourceRecord> {
        let removed = self.resources.remove(address);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    /// Records an operation.
    pub fn record(&mut self, operation: StateOperation, address: &str, error: Option<String>) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            operation,
            address: address.to_string(),
            success: error.is_none(),
            error,
        });
    }
}

impl Default for ProviderState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Refresh => "refresh",
            Self::Delete => "delete",
        };
        write!(f, "{op}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_keeps_creation_time() {
        let mut state = ProviderState::new();
        state.set("linode_domain", "main", json!({"id": "1"}), &json!({"domain": "a.com"}));
        let created = state.get("linode_domain.main").expect("record").created_at;

        state.set("linode_domain", "main", json!({"id": "1", "ttl_sec": 300}), &json!({"domain": "a.com"}));
        let record = state.get("linode_domain.main").expect("record");
        assert_eq!(record.created_at, created);
        assert_eq!(record.state["ttl_sec"], 300);
        assert_eq!(record.config_hash, config_hash(&json!({"domain": "a.com"})));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = ProviderState::new();
        for i in 0..(MAX_HISTORY + 5) {
            state.record(StateOperation::Refresh, &format!("linode_domain.d{i}"), None);
        }
        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history[0].address, "linode_domain.d5");
        assert!(state.history[0].success);
    }

    #[test]
    fn test_remove_reports_missing() {
        let mut state = ProviderState::new();
        assert!(state.remove("linode_domain.none").is_none());
    }

    #[test]
    fn test_refresh_keeps_config_hash() {
        let mut state = ProviderState::new();
        assert!(!state.refresh("linode_domain.main", json!({})));

        state.set("linode_domain", "main", json!({"id": "1"}), &json!({"domain": "a.com"}));
        assert!(state.refresh("linode_domain.main", json!({"id": "1", "status": "active"})));
        let record = state.get("linode_domain.main").expect("record");
        assert_eq!(record.state["status"], "active");
        assert_eq!(record.config_hash, config_hash(&json!({"domain": "a.com"})));
    }
}
