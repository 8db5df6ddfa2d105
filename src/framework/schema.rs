//! Resource schemas.
//!
//! A schema maps attribute names to descriptors. Descriptors drive the
//! planner: presence checks, validators, defaults, unknown handling,
//! semantic equality and replacement detection.

use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;

use super::semantic::SemanticRule;
use super::validators::Validator;
use super::value::is_unknown_marker;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// A boolean value.
    Bool,
    /// An ordered list of values of a single type.
    List(Box<AttributeType>),
    /// An unordered collection of values of a single type.
    Set(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
    /// A record with a fixed set of fields.
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    /// Create a list type.
    #[must_use]
    pub fn list(element_type: Self) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    #[must_use]
    pub fn set(element_type: Self) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create a map type.
    #[must_use]
    pub fn map(element_type: Self) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// Create an object type from `(name, type)` pairs.
    #[must_use]
    pub fn object<const N: usize>(fields: [(&str, Self); N]) -> Self {
        Self::Object(
            fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        )
    }

    /// Returns true if an encoded value conforms to this type. `null` and
    /// unknown markers conform to every type.
    #[must_use]
    pub fn accepts(&self, value: &Json) -> bool {
        if value.is_null() || is_unknown_marker(value) {
            return true;
        }
        match self {
            Self::String => value.is_string(),
            Self::Int64 => value.is_i64(),
            Self::Float64 => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::List(inner) | Self::Set(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| inner.accepts(item))),
            Self::Map(inner) => value
                .as_object()
                .is_some_and(|map| map.values().all(|item| inner.accepts(item))),
            Self::Object(fields) => value.as_object().is_some_and(|map| {
                map.iter().all(|(k, v)| fields.get(k).is_some_and(|ty| ty.accepts(v)))
            }),
        }
    }
}

/// Three-way presence contract on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be set in configuration.
    Required,
    /// May be set; `Null` when unset.
    Optional,
    /// Set by the provider only.
    Computed,
    /// May be set; computed by the provider when unset.
    OptionalComputed,
}

impl Presence {
    /// Returns true if the provider may fill the value.
    #[must_use]
    pub const fn is_computed(self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }
}

/// Describes a single attribute.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeSchema {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Presence contract.
    pub presence: Presence,
    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Elide the value from diagnostics, plan output and logs.
    pub sensitive: bool,
    /// Any change of a known value destroys and recreates the resource.
    pub force_replace: bool,
    /// Substitute the prior known value when the planned value is unknown.
    pub use_state_for_unknown: bool,
    /// Collapse diffs under a domain rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticRule>,
    /// Value substituted when the planned value is `Null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    /// Checks run on known values before plan modification.
    #[serde(skip)]
    pub validators: Vec<Validator>,
}

impl AttributeSchema {
    /// Create a new attribute with the given type and presence.
    #[must_use]
    pub const fn new(attr_type: AttributeType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
            description: String::new(),
            sensitive: false,
            force_replace: false,
            use_state_for_unknown: false,
            semantic: None,
            default: None,
            validators: Vec::new(),
        }
    }

    /// Create a required string attribute.
    #[must_use]
    pub const fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    /// Create an optional string attribute.
    #[must_use]
    pub const fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    /// Create a computed string attribute.
    #[must_use]
    pub const fn computed_string() -> Self {
        Self::new(AttributeType::String, Presence::Computed)
    }

    /// Create a required integer attribute.
    #[must_use]
    pub const fn required_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Required)
    }

    /// Create an optional integer attribute.
    #[must_use]
    pub const fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Optional)
    }

    /// Create a computed integer attribute.
    #[must_use]
    pub const fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Computed)
    }

    /// Create an optional boolean attribute.
    #[must_use]
    pub const fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, Presence::Optional)
    }

    /// The conventional `id` attribute: computed, kept across plans.
    #[must_use]
    pub const fn id(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Presence::Computed).use_state_for_unknown()
    }

    /// Let the provider fill the value when it is unset.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.presence = match self.presence {
            Presence::Required | Presence::Computed => Presence::Computed,
            Presence::Optional | Presence::OptionalComputed => Presence::OptionalComputed,
        };
        self
    }

    /// Mark the attribute as sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Changes force replacement of the resource.
    #[must_use]
    pub const fn force_replace(mut self) -> Self {
        self.force_replace = true;
        self
    }

    /// Keep the prior known value when the planned value is unknown.
    #[must_use]
    pub const fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    /// Attach a semantic equality rule.
    #[must_use]
    pub const fn with_semantic(mut self, rule: SemanticRule) -> Self {
        self.semantic = Some(rule);
        self
    }

    /// Set a default value; the attribute becomes optional+computed.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Json>) -> Self {
        self.default = Some(value.into());
        if self.presence == Presence::Optional {
            self.presence = Presence::OptionalComputed;
        }
        self
    }

    /// Add a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Renders a value for display, hiding sensitive ones.
    #[must_use]
    pub fn render(&self, value: &Json) -> String {
        if is_unknown_marker(value) {
            String::from("(known after apply)")
        } else if self.sensitive && !value.is_null() {
            String::from("(sensitive value)")
        } else {
            value.to_string()
        }
    }
}

/// Schema of one resource kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceSchema {
    /// Schema version.
    pub version: u64,
    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Attributes by name.
    pub attributes: BTreeMap<String, AttributeSchema>,
}

impl ResourceSchema {
    /// Create an empty schema.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            version: 0,
            description: description.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: AttributeSchema) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Look up an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    /// Names of attributes marked sensitive.
    pub fn sensitive_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.sensitive)
            .map(|(name, _)| name.as_str())
    }
}
