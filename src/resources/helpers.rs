//! Refresh-merge and lifecycle helpers shared by the resource handlers.

use std::fmt::Display;
use std::mem;
use tracing::warn;

use crate::error::{ConfigError, ProviderError, Result};
use crate::framework::{
    AttributePath, Diagnostic, Set, SetValue, StringValue, Value, keep_if_semantically_equal,
    keep_or_update,
};
use crate::provider::ResourceResponse;

/// Merges a refreshed value into a model slot.
pub fn merge<T>(slot: &mut Value<T>, refreshed: Value<T>, preserve_known: bool) {
    let old = mem::take(slot);
    *slot = keep_or_update(old, refreshed, preserve_known);
}

/// Merges a refreshed value into a slot with a semantic equality rule: a
/// known prior value survives when `eq` holds, or always under
/// `preserve_known`.
pub fn merge_semantic<T>(
    slot: &mut Value<T>,
    refreshed: T,
    preserve_known: bool,
    eq: impl Fn(&T, &T) -> bool,
) {
    let old = mem::take(slot);
    *slot = if preserve_known && old.is_known() {
        old
    } else {
        keep_if_semantically_equal(old, refreshed, eq)
    };
}

/// `Known(s)` for non-empty strings, `Null` otherwise.
#[must_use]
pub fn string_or_null(s: &str) -> StringValue {
    if s.is_empty() {
        Value::Null
    } else {
        Value::known(s.to_string())
    }
}

/// `Known(n)` for non-zero integers, `Null` otherwise.
#[must_use]
pub const fn int_or_null(n: i64) -> Value<i64> {
    if n == 0 { Value::Null } else { Value::Known(n) }
}

/// Refreshed set value. An empty server set stays an explicit empty set only
/// if the slot already held one.
#[must_use]
pub fn refreshed_set<T: Clone>(slot: &SetValue<T>, items: &[T]) -> SetValue<T> {
    if items.is_empty() && !slot.as_known().is_some_and(|s| s.0.is_empty()) {
        return Value::Null;
    }
    Value::Known(Set(items.iter().cloned().map(Value::Known).collect()))
}

/// Lifts a conversion diagnostic into an error.
///
/// # Errors
///
/// Returns the diagnostic rendered as an internal error.
pub fn converted<T>(result: std::result::Result<T, Diagnostic>) -> Result<T> {
    result.map_err(|d| ProviderError::internal(d.to_string()))
}

/// Decodes a set of strings in stored order.
///
/// # Errors
///
/// Returns an error if the set or an element is unknown.
pub fn strings(value: &SetValue<String>, attribute: &str) -> Result<Vec<String>> {
    converted(value.elements_as(&AttributePath::root(attribute)))
}

/// Parses a numeric id kept as a string.
///
/// # Errors
///
/// Returns an error if the id is not a known integer.
pub fn parse_id(id: &StringValue) -> Result<i64> {
    id.as_known()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ConfigError::validation(format!("invalid id {id:?}"), "id").into())
}

/// Handles a read failure: a 404 drops the record with a warning, anything
/// else is returned.
///
/// # Errors
///
/// Returns `err` unless it is a 404.
pub fn read_not_found(
    err: ProviderError,
    resp: &mut ResourceResponse,
    kind: &str,
    id: impl Display,
) -> Result<()> {
    if !err.is_not_found() {
        return Err(err);
    }
    warn!("Removing {} {} from state because it no longer exists", kind, id);
    resp.diagnostics.add_warning(
        format!("{kind} no longer exists"),
        format!("Removing {kind} with ID {id} from state because it no longer exists"),
    );
    resp.remove();
    Ok(())
}

/// Treats a 404 on delete as success.
///
/// # Errors
///
/// Returns any error other than a 404.
pub fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::framework::{dns_ttl_equal, set_of};

    #[test]
    fn test_merge_rules() {
        let mut slot = StringValue::from("planned");
        merge(&mut slot, StringValue::from("server"), true);
        assert_eq!(slot, StringValue::from("planned"));
        merge(&mut slot, StringValue::from("server"), false);
        assert_eq!(slot, StringValue::from("server"));

        let mut ttl = Value::known(301_i64);
        merge_semantic(&mut ttl, 3600, false, |a, b| dns_ttl_equal(*a, *b));
        assert_eq!(ttl, Value::known(301));
        merge_semantic(&mut ttl, 7200, false, |a, b| dns_ttl_equal(*a, *b));
        assert_eq!(ttl, Value::known(7200));
    }

    #[test]
    fn test_empty_refresh_values() {
        assert!(string_or_null("").is_null());
        assert!(int_or_null(0).is_null());
        assert!(refreshed_set::<String>(&Value::Null, &[]).is_null());
        assert_eq!(
            refreshed_set::<String>(&set_of(Vec::new()), &[]),
            set_of(Vec::<String>::new())
        );
    }

    #[test]
    fn test_not_found_handling() {
        let mut resp = ResourceResponse::with_state(serde_json::json!({"id": "1"}));
        let gone: ProviderError = ApiError::NotFound {
            path: String::from("domains/1"),
        }
        .into();
        read_not_found(gone, &mut resp, "Domain", 1).expect("404 is not an error");
        assert!(resp.state.is_none());
        assert_eq!(resp.diagnostics.warnings().count(), 1);

        let rejected: ProviderError = ApiError::rejected(400, "bad").into();
        assert!(ignore_not_found(Err(rejected)).is_err());
        assert_eq!(parse_id(&StringValue::from("12")).expect("id"), 12);
        assert!(parse_id(&StringValue::Unknown).is_err());
    }
}
