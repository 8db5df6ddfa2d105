//! Tri-state attribute values.
//!
//! Every attribute of a resource model is a [`Value`]: explicitly unset
//! (`Null`), not yet computed (`Unknown`), or a concrete `Known` payload.
//! Equality is variant-aware; two `Unknown`s are equal, `Null` never equals
//! `Unknown`.
//!
//! On the wire to the host a `Known` value is encoded as its payload, `Null`
//! as JSON `null`, and `Unknown` as the object `{"__unknown__": true}`.

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

/// Object key marking an unknown value in encoded state.
pub const UNKNOWN_MARKER: &str = "__unknown__";

/// A tri-state attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value<T> {
    /// The user did not set the attribute.
    Null,
    /// The value will exist once the operation runs.
    Unknown,
    /// A concrete value.
    Known(T),
}

/// String attribute.
pub type StringValue = Value<String>;
/// Integer attribute.
pub type Int64Value = Value<i64>;
/// Boolean attribute.
pub type BoolValue = Value<bool>;
/// Floating point attribute.
pub type Float64Value = Value<f64>;

impl<T> Default for Value<T> {
    fn default() -> Self {
        Self::Null
    }
}

impl<T> Value<T> {
    /// Constructs `Null`.
    #[must_use]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Constructs `Unknown`.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::Unknown
    }

    /// Constructs `Known(value)`.
    #[must_use]
    pub const fn known(value: T) -> Self {
        Self::Known(value)
    }

    /// `Known(v)` for `Some(v)`, `Null` for `None`.
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }

    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for `Unknown`.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true for `Known`.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Borrows the payload of a `Known` value.
    #[must_use]
    pub const fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Takes the payload of a `Known` value.
    #[must_use]
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the payload, keeping the variant.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Value<U> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(f(v)),
        }
    }

    /// Returns `self` if `preserve_known` and `self` is known, else `new`.
    #[must_use]
    pub fn keep_or_update(self, new: Self, preserve_known: bool) -> Self {
        keep_or_update(self, new, preserve_known)
    }

    /// Replaces an `Unknown` with `fallback`; any other variant is kept.
    #[must_use]
    pub fn fill_unknown(self, fallback: Self) -> Self {
        if self.is_unknown() { fallback } else { self }
    }
}

impl<T: Clone> Value<T> {
    /// Collapses `Unknown` to the prior known value, or `Null`.
    #[must_use]
    pub fn finalize(self, prior: Option<&Self>) -> Self {
        match self {
            Self::Unknown => match prior {
                Some(Self::Known(v)) => Self::Known(v.clone()),
                _ => Self::Null,
            },
            other => other,
        }
    }
}

impl<T: Default + Clone> Value<T> {
    /// The payload, or the zero value of `T` for `Null` and `Unknown`.
    #[must_use]
    pub fn value_or_zero(&self) -> T {
        self.as_known().cloned().unwrap_or_default()
    }
}

impl Value<String> {
    /// Borrows a known string, `""` otherwise.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.as_known().map_or("", String::as_str)
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

impl From<&str> for Value<String> {
    fn from(value: &str) -> Self {
        Self::Known(value.to_string())
    }
}

/// The preserve-known merge: `old` if `preserve_known` and `old` is known,
/// otherwise `new`.
#[must_use]
pub fn keep_or_update<T>(old: Value<T>, new: Value<T>, preserve_known: bool) -> Value<T> {
    if preserve_known && old.is_known() {
        old
    } else {
        new
    }
}

/// The JSON encoding of an unknown value.
#[must_use]
pub fn unknown_marker() -> Json {
    serde_json::json!({ UNKNOWN_MARKER: true })
}

/// Returns true if `value` is the encoding of an unknown value.
#[must_use]
pub fn is_unknown_marker(value: &Json) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.len() == 1 && m.get(UNKNOWN_MARKER) == Some(&Json::Bool(true)))
}

/// Returns true if any unknown marker appears anywhere in `value`.
#[must_use]
pub fn contains_unknown(value: &Json) -> bool {
    if is_unknown_marker(value) {
        return true;
    }
    match value {
        Json::Array(items) => items.iter().any(contains_unknown),
        Json::Object(map) => map.values().any(contains_unknown),
        _ => false,
    }
}

/// Collapses every unknown in `state` to the value at the same position in
/// `prior`, or `null` when the prior holds nothing known there.
#[must_use]
pub fn collapse_unknowns(state: Json, prior: Option<&Json>) -> Json {
    if is_unknown_marker(&state) {
        return match prior {
            Some(p) if !is_unknown_marker(p) => collapse_unknowns(p.clone(), None),
            _ => Json::Null,
        };
    }
    match state {
        Json::Object(map) => Json::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let p = prior.and_then(|p| p.get(&k));
                    (k, collapse_unknowns(v, p))
                })
                .collect(),
        ),
        Json::Array(items) => Json::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    let p = prior.and_then(|p| p.get(i));
                    collapse_unknowns(v, p)
                })
                .collect(),
        ),
        other => other,
    }
}

impl<T: DeserializeOwned> Value<T> {
    /// Decodes a value from its JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-null, non-unknown payload does not decode as `T`.
    pub fn from_json(raw: Json) -> Result<Self, serde_json::Error> {
        if raw.is_null() {
            Ok(Self::Null)
        } else if is_unknown_marker(&raw) {
            Ok(Self::Unknown)
        } else {
            serde_json::from_value(raw).map(Self::Known)
        }
    }
}

impl<T: Serialize> Serialize for Value<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(UNKNOWN_MARKER, &true)?;
                map.end()
            }
            Self::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Json::deserialize(deserializer)?;
        Self::from_json(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_aware_equality() {
        assert_ne!(StringValue::Null, StringValue::Unknown);
        assert_ne!(StringValue::Unknown, StringValue::known(String::new()));
        assert_eq!(StringValue::Unknown, StringValue::Unknown);
        assert_eq!(Int64Value::known(3), Int64Value::known(3));
        assert_ne!(Int64Value::known(3), Int64Value::known(4));
    }

    #[test]
    fn test_keep_or_update() {
        let old = Int64Value::known(1);
        assert_eq!(keep_or_update(old.clone(), Int64Value::known(2), true), old);
        assert_eq!(
            keep_or_update(old, Int64Value::known(2), false),
            Int64Value::known(2)
        );
        assert_eq!(
            keep_or_update(Int64Value::Unknown, Int64Value::known(2), true),
            Int64Value::known(2)
        );
        assert_eq!(
            keep_or_update(Int64Value::Null, Int64Value::Null, true),
            Int64Value::Null
        );
    }

    #[test]
    fn test_keep_or_update_is_idempotent_on_known_base() {
        let samples = [
            Int64Value::Null,
            Int64Value::Unknown,
            Int64Value::known(7),
            Int64Value::known(9),
        ];
        for a in &samples {
            for b in &samples {
                for c in &samples {
                    let nested = keep_or_update(
                        keep_or_update(a.clone(), b.clone(), true),
                        c.clone(),
                        true,
                    );
                    if a.is_known() {
                        assert_eq!(nested, keep_or_update(a.clone(), c.clone(), true));
                    } else if b.is_known() {
                        assert_eq!(nested, b.clone());
                    } else {
                        assert_eq!(nested, c.clone());
                    }
                }
            }
        }
    }

    #[test]
    fn test_value_or_zero() {
        assert_eq!(Int64Value::Null.value_or_zero(), 0);
        assert_eq!(Int64Value::Unknown.value_or_zero(), 0);
        assert!(BoolValue::known(true).value_or_zero());
    }

    #[test]
    fn test_json_encoding() {
        let encoded = serde_json::to_value(StringValue::Unknown).expect("encode");
        assert!(is_unknown_marker(&encoded));

        let decoded: StringValue = serde_json::from_value(encoded).expect("decode");
        assert!(decoded.is_unknown());

        let decoded: StringValue = serde_json::from_value(Json::Null).expect("decode");
        assert!(decoded.is_null());

        let decoded: Int64Value = serde_json::from_value(serde_json::json!(42)).expect("decode");
        assert_eq!(decoded, Int64Value::known(42));

        assert!(serde_json::from_value::<Int64Value>(serde_json::json!("x")).is_err());
    }

    #[test]
    fn test_finalize() {
        let prior = StringValue::known(String::from("a"));
        assert_eq!(StringValue::Unknown.finalize(Some(&prior)), prior);
        assert_eq!(StringValue::Unknown.finalize(None), StringValue::Null);
        assert_eq!(
            StringValue::Unknown.finalize(Some(&StringValue::Unknown)),
            StringValue::Null
        );
        assert_eq!(
            StringValue::from("b").finalize(Some(&prior)),
            StringValue::from("b")
        );
    }

    #[test]
    fn test_collapse_unknowns_nested() {
        let state = serde_json::json!({
            "id": "12",
            "kubeconfig": unknown_marker(),
            "status": unknown_marker(),
            "pool": [{ "id": unknown_marker(), "count": 3 }],
        });
        let prior = serde_json::json!({
            "kubeconfig": "abc",
            "pool": [{ "id": 99, "count": 2 }],
        });

        let collapsed = collapse_unknowns(state, Some(&prior));
        assert!(!contains_unknown(&collapsed));
        assert_eq!(collapsed["kubeconfig"], "abc");
        assert_eq!(collapsed["status"], Json::Null);
        assert_eq!(collapsed["pool"][0]["id"], 99);
        assert_eq!(collapsed["pool"][0]["count"], 3);
    }
}
