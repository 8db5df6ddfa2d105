//! Container attribute types.
//!
//! Containers carry the same tri-state as primitives on the outside
//! (`Value<List<T>>`) and a typed value per element on the inside.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::diagnostics::{AttributePath, Diagnostic};
use super::value::Value;

/// Ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent, bound(deserialize = "T: DeserializeOwned"))]
pub struct List<T>(pub Vec<Value<T>>);

/// Unordered collection of values; equality ignores element order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent, bound(deserialize = "T: DeserializeOwned"))]
pub struct Set<T>(pub Vec<Value<T>>);

/// String-keyed map of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent, bound(deserialize = "T: DeserializeOwned"))]
pub struct Map<T>(pub BTreeMap<String, Value<T>>);

/// List attribute.
pub type ListValue<T> = Value<List<T>>;
/// Set attribute.
pub type SetValue<T> = Value<Set<T>>;
/// Map attribute.
pub type MapValue<T> = Value<Map<T>>;

impl<T> Default for List<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Default for Set<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Default for Map<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T: PartialEq> PartialEq for Set<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut used = vec![false; other.0.len()];
        self.0.iter().all(|item| {
            let found = other
                .0
                .iter()
                .enumerate()
                .find(|(i, candidate)| !used[*i] && *candidate == item);
            found.is_some_and(|(i, _)| {
                used[i] = true;
                true
            })
        })
    }
}

impl<T: Eq> Eq for Set<T> {}

/// A known list of known elements.
pub fn list_of<T>(items: impl IntoIterator<Item = T>) -> ListValue<T> {
    Value::Known(List(items.into_iter().map(Value::Known).collect()))
}

/// A known set of known elements.
pub fn set_of<T>(items: impl IntoIterator<Item = T>) -> SetValue<T> {
    Value::Known(Set(items.into_iter().map(Value::Known).collect()))
}

/// A known map of known elements.
pub fn map_of<T>(items: impl IntoIterator<Item = (String, T)>) -> MapValue<T> {
    Value::Known(Map(
        items.into_iter().map(|(k, v)| (k, Value::Known(v))).collect(),
    ))
}

fn element_error(path: &AttributePath, index: usize, variant: &str) -> Diagnostic {
    Diagnostic::error(
        "Value Conversion Error",
        format!("element {index} is {variant} and cannot be decoded"),
    )
    .with_path(path.clone().index(index))
}

fn decode_elements<T: Clone>(
    items: &[Value<T>],
    path: &AttributePath,
) -> Result<Vec<T>, Diagnostic> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Known(v) => Ok(v.clone()),
            Value::Unknown => Err(element_error(path, i, "unknown")),
            Value::Null => Err(element_error(path, i, "null")),
        })
        .collect()
}

fn unknown_collection(path: &AttributePath) -> Diagnostic {
    Diagnostic::error(
        "Value Conversion Error",
        "the collection is unknown and cannot be decoded",
    )
    .with_path(path.clone())
}

impl<T: Clone> Value<List<T>> {
    /// Decodes into a vector. `Null` decodes as empty; `Unknown` and
    /// non-known elements are errors.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic naming the offending element.
    pub fn elements_as(&self, path: &AttributePath) -> Result<Vec<T>, Diagnostic> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::Unknown => Err(unknown_collection(path)),
            Self::Known(list) => decode_elements(&list.0, path),
        }
    }
}

impl<T: Clone> Value<Set<T>> {
    /// Decodes into a vector in stored order.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic naming the offending element.
    pub fn elements_as(&self, path: &AttributePath) -> Result<Vec<T>, Diagnostic> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::Unknown => Err(unknown_collection(path)),
            Self::Known(set) => decode_elements(&set.0, path),
        }
    }
}

impl<T: Clone> Value<Map<T>> {
    /// Decodes into a map.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic naming the offending key.
    pub fn elements_as(&self, path: &AttributePath) -> Result<BTreeMap<String, T>, Diagnostic> {
        match self {
            Self::Null => Ok(BTreeMap::new()),
            Self::Unknown => Err(unknown_collection(path)),
            Self::Known(map) => map
                .0
                .iter()
                .map(|(k, v)| match v {
                    Value::Known(inner) => Ok((k.clone(), inner.clone())),
                    _ => Err(Diagnostic::error(
                        "Value Conversion Error",
                        format!("map entry {k:?} is not known and cannot be decoded"),
                    )
                    .with_path(path.clone().attr(k.clone()))),
                })
                .collect(),
        }
    }
}
