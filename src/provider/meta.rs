//! Shared provider state handed to every resource operation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::framework::{Value, is_unknown_marker};
use crate::linode::LinodeClient;

/// The API client and configuration; the only state shared across
/// concurrent operations.
#[derive(Debug, Clone)]
pub struct ProviderMeta {
    /// API client.
    pub client: LinodeClient,
    /// Provider configuration.
    pub config: Arc<ProviderConfig>,
}

impl ProviderMeta {
    /// Validates `config` and builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = LinodeClient::new(&config)?;
        debug!("Provider configured for {}", client.base_url());
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Resolves the `id` of a freshly created record.
    ///
    /// With `empty_id_workaround` the server id always wins, even over a
    /// known planned value; otherwise a known planned id is kept.
    #[must_use]
    pub fn settle_id<T>(&self, planned: Value<T>, created: T) -> Value<T> {
        if self.config.empty_id_workaround {
            Value::known(created)
        } else {
            planned.keep_or_update(Value::known(created), true)
        }
    }

    /// After an update, fills planned values that are still unknown from the
    /// prior state when `empty_id_workaround` is on.
    pub fn carry_over_prior(&self, state: &mut Json, prior: &Json) {
        if !self.config.empty_id_workaround {
            return;
        }
        carry_over_prior(state, prior);
    }
}

/// Copies top-level prior values into `state` where `state` holds unknown.
///
/// A null planned value is a cleared attribute and stays null.
pub fn carry_over_prior(state: &mut Json, prior: &Json) {
    let (Some(state), Some(prior)) = (state.as_object_mut(), prior.as_object()) else {
        return;
    };
    for (name, before) in prior {
        if let Some(current) = state.get_mut(name) {
            if is_unknown_marker(current) && !before.is_null() {
                *current = before.clone();
            }
        }
    }
}

/// Decodes a model record from host state.
///
/// # Errors
///
/// Returns an error if the state does not match the model.
pub fn decode_model<T: DeserializeOwned>(state: &Json) -> Result<T> {
    serde_json::from_value(state.clone())
        .map_err(|e| ProviderError::internal(format!("Failed to decode resource state: {e}")))
}

/// Encodes a model record as host state.
///
/// # Errors
///
/// Returns an error if the model cannot be serialized.
pub fn encode_model<T: Serialize>(model: &T) -> Result<Json> {
    serde_json::to_value(model)
        .map_err(|e| ProviderError::internal(format!("Failed to encode resource state: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{StringValue, unknown_marker};
    use serde_json::json;

    fn meta(workaround: bool) -> ProviderMeta {
        ProviderMeta::new(ProviderConfig {
            token: Some(String::from("t")),
            empty_id_workaround: workaround,
            ..ProviderConfig::default()
        })
        .expect("meta")
    }

    #[test]
    fn test_settle_id_both_modes() {
        let planned = StringValue::known(String::new());
        assert_eq!(
            meta(true).settle_id(planned.clone(), String::from("42")),
            StringValue::from("42")
        );
        assert_eq!(meta(false).settle_id(planned, String::from("42")), StringValue::from(""));
        assert_eq!(
            meta(false).settle_id(StringValue::unknown(), String::from("42")),
            StringValue::from("42")
        );
    }

    #[test]
    fn test_carry_over_both_modes() {
        let prior = json!({"id": "1", "label": "a", "status": "ready", "note": "old"});
        let planned = json!({"id": unknown_marker(), "label": "b", "status": unknown_marker(), "note": null});

        let mut with = planned.clone();
        meta(true).carry_over_prior(&mut with, &prior);
        assert_eq!(with, json!({"id": "1", "label": "b", "status": "ready", "note": null}));

        let mut without = planned.clone();
        meta(false).carry_over_prior(&mut without, &prior);
        assert_eq!(without, planned);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ProviderMeta::new(ProviderConfig::default()).is_err());
    }
}
