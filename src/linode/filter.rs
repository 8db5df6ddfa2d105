//! Builder for the `X-Filter` request header.
//!
//! List endpoints accept a JSON filter: plain keys match by equality,
//! operator objects (`{"+gte": 5}`) compare, `+or` takes alternatives and
//! `+order_by`/`+order` sort the result.

use serde_json::{Map, Value as Json, json};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// An `X-Filter` expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Map<String, Json>,
    any_of: Vec<Json>,
    order_by: Option<(String, Order)>,
}

impl Filter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches `key == value`.
    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Matches `key >= value`.
    #[must_use]
    pub fn gte(self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.op(key, "+gte", value)
    }

    /// Matches `key > value`.
    #[must_use]
    pub fn gt(self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.op(key, "+gt", value)
    }

    /// Matches when `key` equals any of `values`.
    #[must_use]
    pub fn any_of<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Json>,
    {
        self.any_of
            .extend(values.into_iter().map(|v| json!({ key: v.into() })));
        self
    }

    /// Sorts by `key`.
    #[must_use]
    pub fn order_by(mut self, key: impl Into<String>, order: Order) -> Self {
        self.order_by = Some((key.into(), order));
        self
    }

    fn op(mut self, key: impl Into<String>, op: &str, value: impl Into<Json>) -> Self {
        let key = key.into();
        let entry = self
            .conditions
            .entry(key)
            .or_insert_with(|| Json::Object(Map::new()));
        if let Json::Object(ops) = &mut *entry {
            ops.insert(op.to_string(), value.into());
        } else {
            *entry = json!({ op: value.into() });
        }
        self
    }

    /// Returns the filter as JSON.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut out = self.conditions.clone();
        if !self.any_of.is_empty() {
            out.insert(String::from("+or"), Json::Array(self.any_of.clone()));
        }
        if let Some((key, order)) = &self.order_by {
            out.insert(String::from("+order_by"), Json::String(key.clone()));
            out.insert(String::from("+order"), Json::String(order.as_str().to_string()));
        }
        Json::Object(out)
    }

    /// Returns the header value.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    /// Returns true when the filter has no conditions and no ordering.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.any_of.is_empty() && self.order_by.is_none()
    }
}
