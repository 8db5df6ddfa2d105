//! Plan computation.
//!
//! Turns a resource configuration plus the prior state into a planned
//! state and an attribute diff. Phases run in a fixed order and each one
//! aborts on error:
//!
//! 1. type, presence and validator checks on the configuration
//! 2. plan modification: defaults, computed unknowns, use-state-for-unknown,
//!    semantic collapse against the prior value
//! 3. diff against the prior state and replacement detection

use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::fmt;
use tracing::debug;

use super::diagnostics::{AttributePath, Diagnostics};
use super::schema::{AttributeSchema, AttributeType, Presence, ResourceSchema};
use super::value::{is_unknown_marker, unknown_marker};

/// What applying a plan will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// No prior state; the resource will be created.
    Create,
    /// The resource will be updated in place.
    Update,
    /// A force-replace attribute changed; destroy then create.
    Replace,
    /// Nothing to do.
    NoChange,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Replace => write!(f, "REPLACE"),
            Self::NoChange => write!(f, "NO CHANGE"),
        }
    }
}

/// A single attribute difference.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub attribute: String,
    /// Display form of the prior value.
    pub before: String,
    /// Display form of the planned value.
    pub after: String,
    /// The change forces replacement.
    pub requires_replace: bool,
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.attribute, self.before, self.after)?;
        if self.requires_replace {
            write!(f, " (forces replacement)")?;
        }
        Ok(())
    }
}

/// Result of planning one resource instance.
#[derive(Debug, Clone, Serialize)]
pub struct ResourcePlan {
    /// Action the plan implies.
    pub action: PlanAction,
    /// Planned state, with unknown markers for values computed on apply.
    pub planned_state: Json,
    /// Attribute differences against the prior state.
    pub changes: Vec<AttributeChange>,
    /// Diagnostics produced while planning.
    pub diagnostics: Diagnostics,
}

impl ResourcePlan {
    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            action: PlanAction::NoChange,
            planned_state: Json::Null,
            changes: Vec::new(),
            diagnostics,
        }
    }

    /// Returns true if applying the plan calls the provider.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.action != PlanAction::NoChange
    }

    /// Returns true if the plan destroys and recreates the resource.
    #[must_use]
    pub fn requires_replace(&self) -> bool {
        self.action == PlanAction::Replace
    }
}

/// Computes plans for one resource schema.
#[derive(Debug)]
pub struct Planner<'a> {
    schema: &'a ResourceSchema,
}

fn is_known(value: &Json) -> bool {
    !value.is_null() && !is_unknown_marker(value)
}

/// Element-wise equality of two JSON arrays, ignoring order.
fn same_elements(a: &Json, b: &Json) -> bool {
    let (Some(a), Some(b)) = (a.as_array(), b.as_array()) else {
        return false;
    };
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|item| {
        let found = b
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && candidate == item);
        found.is_some_and(|i| {
            used[i] = true;
            true
        })
    })
}

impl<'a> Planner<'a> {
    /// Creates a planner for `schema`.
    #[must_use]
    pub const fn new(schema: &'a ResourceSchema) -> Self {
        Self { schema }
    }

    /// Checks a configuration without planning it.
    #[must_use]
    pub fn validate(&self, config: &Json) -> Diagnostics {
        let mut diags = Diagnostics::new();

        let Some(config) = config.as_object() else {
            diags.add_error(
                "Invalid Configuration",
                "resource configuration must be an object",
            );
            return diags;
        };

        for name in config.keys() {
            if !self.schema.attributes.contains_key(name) {
                diags.add_attribute_error(
                    AttributePath::root(name.clone()),
                    "Unsupported argument",
                    format!("An argument named {name:?} is not expected here."),
                );
            }
        }

        for (name, attr) in &self.schema.attributes {
            let raw = config.get(name).unwrap_or(&Json::Null);
            Self::validate_attribute(name, attr, raw, &mut diags);
        }

        diags
    }

    fn validate_attribute(name: &str, attr: &AttributeSchema, raw: &Json, diags: &mut Diagnostics) {
        let path = AttributePath::root(name);

        if !attr.attr_type.accepts(raw) {
            diags.add_attribute_error(
                path,
                "Incorrect attribute value type",
                format!("{name} has the wrong type"),
            );
            return;
        }

        match attr.presence {
            Presence::Required if raw.is_null() => {
                diags.add_attribute_error(
                    path,
                    "Missing required argument",
                    format!("The argument {name:?} is required, but no definition was found."),
                );
                return;
            }
            Presence::Computed if !raw.is_null() => {
                diags.add_attribute_error(
                    path,
                    "Value for unconfigurable attribute",
                    format!("{name} is computed by the provider and cannot be set."),
                );
                return;
            }
            _ => {}
        }

        if is_known(raw) {
            for validator in &attr.validators {
                if let Err(message) = validator.validate(raw) {
                    diags.add_attribute_error(path.clone(), "Invalid Attribute Value", message);
                }
            }
        }
    }

    /// Plans `config` against `prior`.
    #[must_use]
    pub fn plan(&self, prior: Option<&Json>, config: &Json) -> ResourcePlan {
        self.plan_with(prior, config, |_, _, _| {})
    }

    /// Plans `config` against `prior`, running `hook` on the modified plan
    /// before it is diffed. The hook runs again with no prior when the plan
    /// turns into a replacement.
    pub fn plan_with<F>(&self, prior: Option<&Json>, config: &Json, mut hook: F) -> ResourcePlan
    where
        F: FnMut(&mut Json, Option<&Json>, &mut Diagnostics),
    {
        let mut diags = self.validate(config);
        if diags.has_error() {
            return ResourcePlan::failed(diags);
        }

        let empty = Map::new();
        let config = config.as_object().unwrap_or(&empty);
        let prior_obj = prior.and_then(Json::as_object);

        let mut planned = Self::hooked(self.modify(config, prior_obj), prior, &mut hook, &mut diags);
        if diags.has_error() {
            return ResourcePlan::failed(diags);
        }

        let Some(prior_obj) = prior_obj else {
            let changes = self.describe_create(&planned);
            return ResourcePlan {
                action: PlanAction::Create,
                planned_state: Json::Object(planned),
                changes,
                diagnostics: diags,
            };
        };

        let mut changes = Vec::new();
        let mut provider_computed = Vec::new();
        let mut replace = false;

        for (name, attr) in &self.schema.attributes {
            let before = prior_obj.get(name).unwrap_or(&Json::Null);
            let after = planned.get(name).unwrap_or(&Json::Null);

            let configured = config.get(name).is_some_and(|v| !v.is_null());
            if attr.presence.is_computed() && !configured && attr.default.is_none() && is_unknown_marker(after) {
                provider_computed.push(name.clone());
                continue;
            }

            if before == after {
                continue;
            }

            let requires_replace = attr.force_replace && (is_known(before) || is_known(after));
            replace |= requires_replace;
            changes.push(AttributeChange {
                attribute: name.clone(),
                before: attr.render(before),
                after: attr.render(after),
                requires_replace,
            });
        }

        if changes.is_empty() {
            for name in provider_computed {
                let value = prior_obj.get(&name).cloned().unwrap_or(Json::Null);
                planned.insert(name, value);
            }
            debug!("Plan has no changes");
            return ResourcePlan {
                action: PlanAction::NoChange,
                planned_state: Json::Object(planned),
                changes,
                diagnostics: diags,
            };
        }

        if replace {
            let planned = Self::hooked(self.modify(config, None), None, &mut hook, &mut diags);
            if diags.has_error() {
                return ResourcePlan::failed(diags);
            }
            debug!("Plan requires replacement ({} changes)", changes.len());
            return ResourcePlan {
                action: PlanAction::Replace,
                planned_state: Json::Object(planned),
                changes,
                diagnostics: diags,
            };
        }

        for name in provider_computed {
            if let Some(attr) = self.schema.attribute(&name) {
                let before = prior_obj.get(&name).unwrap_or(&Json::Null);
                changes.push(AttributeChange {
                    attribute: name.clone(),
                    before: attr.render(before),
                    after: attr.render(&unknown_marker()),
                    requires_replace: false,
                });
            }
        }

        ResourcePlan {
            action: PlanAction::Update,
            planned_state: Json::Object(planned),
            changes,
            diagnostics: diags,
        }
    }

    fn hooked<F>(
        planned: Map<String, Json>,
        prior: Option<&Json>,
        hook: &mut F,
        diags: &mut Diagnostics,
    ) -> Map<String, Json>
    where
        F: FnMut(&mut Json, Option<&Json>, &mut Diagnostics),
    {
        let mut planned = Json::Object(planned);
        hook(&mut planned, prior, diags);
        match planned {
            Json::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Plan modification: defaults, computed unknowns, use-state-for-unknown
    /// and semantic collapse.
    fn modify(&self, config: &Map<String, Json>, prior: Option<&Map<String, Json>>) -> Map<String, Json> {
        let mut planned = Map::new();

        for (name, attr) in &self.schema.attributes {
            let mut value = config.get(name).cloned().unwrap_or(Json::Null);
            let before = prior.and_then(|p| p.get(name));

            if value.is_null() {
                if let Some(default) = &attr.default {
                    value = default.clone();
                } else if attr.presence.is_computed() {
                    value = unknown_marker();
                }
            }

            if attr.use_state_for_unknown && is_unknown_marker(&value) {
                if let Some(before) = before.filter(|b| is_known(b)) {
                    value = before.clone();
                }
            }

            if let (Some(rule), Some(before)) = (attr.semantic, before) {
                if is_known(&value) && is_known(before) && rule.equivalent(&value, before) {
                    value = before.clone();
                }
            }

            // Sets compare without order; keep the stored ordering.
            if let (AttributeType::Set(_), Some(before)) = (&attr.attr_type, before) {
                if same_elements(&value, before) {
                    value = before.clone();
                }
            }

            planned.insert(name.clone(), value);
        }

        planned
    }

    fn describe_create(&self, planned: &Map<String, Json>) -> Vec<AttributeChange> {
        self.schema
            .attributes
            .iter()
            .filter_map(|(name, attr)| {
                let after = planned.get(name)?;
                if after.is_null() {
                    return None;
                }
                Some(AttributeChange {
                    attribute: name.clone(),
                    before: String::from("null"),
                    after: attr.render(after),
                    requires_replace: false,
                })
            })
            .collect()
    }
}
