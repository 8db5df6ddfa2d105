//! Output formatting for CLI commands.

use colored::Colorize;
use serde_json::{Value as Json, json};
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::framework::{AttributeType, Diagnostics, Presence, ResourceSchema, Severity};
use crate::provider::Registry;
use crate::state::{ProviderState, StateOperation};

use super::commands::OutputFormat;
use super::driver::{DriverPlan, RunReport, Step};

const SENSITIVE: &str = "(sensitive value)";

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    format: OutputFormat,
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Type")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Attributes")]
    attributes: usize,
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    name: String,
    #[tabled(rename = "Type")]
    attr_type: String,
    #[tabled(rename = "Presence")]
    presence: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Changes")]
    changes: usize,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Replaces the values of sensitive top-level attributes.
#[must_use]
pub fn redact(schema: &ResourceSchema, state: &Json) -> Json {
    let mut state = state.clone();
    if let Some(map) = state.as_object_mut() {
        for name in schema.sensitive_attributes() {
            if let Some(value) = map.get_mut(name) {
                if !value.is_null() {
                    *value = Json::from(SENSITIVE);
                }
            }
        }
    }
    state
}

fn redact_record(registry: &Registry, type_name: &str, state: &Json) -> Json {
    registry.resource(type_name).map_or_else(
        |_| registry.data_source(type_name).map_or_else(|_| state.clone(), |d| redact(d.schema(), state)),
        |r| redact(r.schema(), state),
    )
}

fn type_name(ty: &AttributeType) -> String {
    match ty {
        AttributeType::String => String::from("string"),
        AttributeType::Int64 => String::from("int64"),
        AttributeType::Float64 => String::from("float64"),
        AttributeType::Bool => String::from("bool"),
        AttributeType::List(inner) => format!("list({})", type_name(inner)),
        AttributeType::Set(inner) => format!("set({})", type_name(inner)),
        AttributeType::Map(inner) => format!("map({})", type_name(inner)),
        AttributeType::Object(_) => String::from("object"),
    }
}

const fn presence_name(presence: Presence) -> &'static str {
    match presence {
        Presence::Required => "required",
        Presence::Optional => "optional",
        Presence::Computed => "computed",
        Presence::OptionalComputed => "optional, computed",
    }
}

fn operation_label(operation: StateOperation) -> String {
    match operation {
        StateOperation::Create => "+create".green().to_string(),
        StateOperation::Update => "~update".yellow().to_string(),
        StateOperation::Replace => "-/+replace".yellow().to_string(),
        StateOperation::Refresh => "refresh".cyan().to_string(),
        StateOperation::Delete => "-delete".red().to_string(),
    }
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Lists registered resource and data source types.
    #[must_use]
    pub fn format_types(&self, registry: &Registry) -> String {
        let mut rows = Vec::new();
        for name in registry.resource_names() {
            if let Ok(resource) = registry.resource(name) {
                rows.push(TypeRow {
                    name: name.to_string(),
                    kind: String::from("resource"),
                    attributes: resource.schema().attributes.len(),
                });
            }
        }
        for name in registry.data_source_names() {
            if let Ok(data_source) = registry.data_source(name) {
                rows.push(TypeRow {
                    name: name.to_string(),
                    kind: String::from("data source"),
                    attributes: data_source.schema().attributes.len(),
                });
            }
        }

        match self.format {
            OutputFormat::Json => {
                let types: Vec<Json> = rows
                    .iter()
                    .map(|r| json!({"type": r.name, "kind": r.kind, "attributes": r.attributes}))
                    .collect();
                serde_json::to_string_pretty(&types).unwrap_or_default()
            }
            OutputFormat::Text => format!("{}\n", Table::new(rows)),
        }
    }

    /// Formats one schema.
    #[must_use]
    pub fn format_schema(&self, name: &str, schema: &ResourceSchema) -> String {
        if matches!(self.format, OutputFormat::Json) {
            return serde_json::to_string_pretty(schema).unwrap_or_default();
        }

        let rows: Vec<AttributeRow> = schema
            .attributes
            .iter()
            .map(|(attr, s)| {
                let mut flags = Vec::new();
                if s.sensitive {
                    flags.push("sensitive");
                }
                if s.force_replace {
                    flags.push("forces replacement");
                }
                if s.default.is_some() {
                    flags.push("default");
                }
                AttributeRow {
                    name: attr.clone(),
                    attr_type: type_name(&s.attr_type),
                    presence: presence_name(s.presence).to_string(),
                    flags: flags.join(", "),
                }
            })
            .collect();

        let mut output = format!("{}\n", name.bold());
        if !schema.description.is_empty() {
            let _ = writeln!(output, "{}", schema.description);
        }
        let _ = writeln!(output, "{}", Table::new(rows));
        output
    }

    /// Formats diagnostics for one address; empty when there are none.
    #[must_use]
    pub fn format_diagnostics(&self, address: &str, diags: &Diagnostics) -> String {
        if matches!(self.format, OutputFormat::Json) {
            if diags.is_empty() {
                return String::new();
            }
            return serde_json::to_string_pretty(&json!({"address": address, "diagnostics": diags}))
                .unwrap_or_default();
        }

        let mut output = String::new();
        for diag in diags.iter() {
            let label = match diag.severity {
                Severity::Error => "Error".red().bold().to_string(),
                Severity::Warning => "Warning".yellow().bold().to_string(),
            };
            let _ = write!(output, "{label}: {} ({address}", diag.summary);
            if !diag.path.is_empty() {
                let _ = write!(output, ", at {}", diag.path);
            }
            output.push_str(")\n");
            if !diag.detail.is_empty() {
                let _ = writeln!(output, "  {}", diag.detail);
            }
        }
        output
    }

    /// Formats a driver plan.
    #[must_use]
    pub fn format_plan(&self, plan: &DriverPlan, registry: &Registry) -> String {
        match self.format {
            OutputFormat::Json => Self::format_plan_json(plan, registry),
            OutputFormat::Text => self.format_plan_text(plan, registry),
        }
    }

    fn format_plan_json(plan: &DriverPlan, registry: &Registry) -> String {
        let steps: Vec<Json> = plan
            .steps
            .iter()
            .filter_map(|step| {
                let operation = step.operation()?;
                let changes = match step {
                    Step::Apply { plan, .. } => json!(plan.changes),
                    Step::Destroy { .. } => json!([]),
                };
                Some(json!({"address": step.address(), "operation": operation, "changes": changes}))
            })
            .collect();
        let data: Vec<Json> = plan
            .data
            .iter()
            .map(|d| {
                json!({
                    "address": d.address,
                    "state": d.state.as_ref().map(|s| redact_record(registry, &d.type_name, s)),
                    "diagnostics": d.diagnostics,
                })
            })
            .collect();
        serde_json::to_string_pretty(&json!({"steps": steps, "data": data})).unwrap_or_default()
    }

    fn format_plan_text(&self, plan: &DriverPlan, registry: &Registry) -> String {
        let mut output = String::new();

        for data in &plan.data {
            output.push_str(&self.format_diagnostics(&data.address, &data.diagnostics));
            if let Some(state) = &data.state {
                let shown = redact_record(registry, &data.type_name, state);
                let _ = writeln!(
                    output,
                    "{} data.{}: {}",
                    "<=".cyan(),
                    data.address,
                    serde_json::to_string(&shown).unwrap_or_default()
                );
            }
        }

        for step in &plan.steps {
            if let Some(diags) = step.diagnostics() {
                output.push_str(&self.format_diagnostics(&step.address(), diags));
            }
        }

        if plan.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes. Infrastructure matches the configuration.",
                "✓".green()
            );
            return output;
        }

        let rows: Vec<StepRow> = plan
            .steps
            .iter()
            .filter_map(|step| {
                let operation = step.operation()?;
                let changes = match step {
                    Step::Apply { plan, .. } => plan.changes.len(),
                    Step::Destroy { .. } => 0,
                };
                Some((operation, step.address(), changes))
            })
            .enumerate()
            .map(|(i, (operation, address, changes))| StepRow {
                index: i + 1,
                action: operation_label(operation),
                address,
                changes,
            })
            .collect();
        let _ = writeln!(output, "{}", Table::new(rows));

        for step in &plan.steps {
            if let Step::Apply { plan: p, .. } = step {
                if p.changes.is_empty() || step.operation().is_none() {
                    continue;
                }
                let _ = writeln!(output, "\n  {}:", step.address().bold());
                for change in &p.changes {
                    let _ = writeln!(output, "    {change}");
                }
            }
        }

        let _ = writeln!(
            output,
            "\nPlan: {} to create, {} to update, {} to replace, {} to destroy.",
            plan.count(StateOperation::Create).to_string().green(),
            plan.count(StateOperation::Update).to_string().yellow(),
            plan.count(StateOperation::Replace).to_string().yellow(),
            plan.count(StateOperation::Delete).to_string().red()
        );
        output
    }

    /// Formats the outcome of a run.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        if matches!(self.format, OutputFormat::Json) {
            let outcomes: Vec<Json> = report
                .outcomes
                .iter()
                .map(|o| {
                    json!({
                        "address": o.address,
                        "operation": o.operation,
                        "success": o.success(),
                        "diagnostics": o.diagnostics,
                    })
                })
                .collect();
            return serde_json::to_string_pretty(&json!({
                "success": report.success(),
                "outcomes": outcomes,
                "skipped": report.skipped,
            }))
            .unwrap_or_default();
        }

        let mut output = String::new();
        for outcome in &report.outcomes {
            let mark = if outcome.success() { "✓".green() } else { "✗".red() };
            let _ = writeln!(output, "{mark} {} {}", operation_label(outcome.operation), outcome.address);
            output.push_str(&self.format_diagnostics(&outcome.address, &outcome.diagnostics));
        }
        for address in &report.skipped {
            let _ = writeln!(output, "{} skipped {address}", "-".dimmed());
        }

        let _ = writeln!(
            output,
            "\n{} succeeded, {} failed, {} skipped.",
            report.outcomes.len() - report.failed(),
            report.failed(),
            report.skipped.len()
        );
        output
    }

    /// Formats the stored state, or one record when `address` is given.
    #[must_use]
    pub fn format_state(&self, state: &ProviderState, registry: &Registry, address: Option<&str>) -> String {
        let records = state
            .resources
            .iter()
            .filter(|(a, _)| address.is_none_or(|wanted| wanted == a.as_str()));

        match self.format {
            OutputFormat::Json => {
                let resources: serde_json::Map<String, Json> = records
                    .map(|(a, r)| (a.clone(), redact_record(registry, &r.type_name, &r.state)))
                    .collect();
                serde_json::to_string_pretty(&json!({
                    "version": state.version,
                    "last_updated": state.last_updated,
                    "resources": resources,
                }))
                .unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if let Some(address) = address {
                    match state.get(address) {
                        Some(record) => {
                            let shown = redact_record(registry, &record.type_name, &record.state);
                            let _ = writeln!(output, "{}", address.bold());
                            if let Some(map) = shown.as_object() {
                                for (name, value) in map {
                                    let _ = writeln!(output, "  {name} = {value}");
                                }
                            }
                        }
                        None => {
                            let _ = writeln!(output, "No resource {address} in state.");
                        }
                    }
                    return output;
                }

                let rows: Vec<RecordRow> = records
                    .map(|(a, r)| RecordRow {
                        address: a.clone(),
                        id: r.state.get("id").map_or_else(String::new, |id| {
                            id.as_str().map_or_else(|| id.to_string(), str::to_string)
                        }),
                        updated: r.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect();

                let _ = writeln!(output, "State version {}, last updated {}", state.version, state.last_updated);
                if rows.is_empty() {
                    output.push_str("No resources in state.\n");
                } else {
                    let _ = writeln!(output, "{}", Table::new(rows));
                }

                if !state.history.is_empty() {
                    let _ = writeln!(output, "\nRecent history:");
                    for entry in state.history.iter().rev().take(5) {
                        let mark = if entry.success { "✓".green() } else { "✗".red() };
                        let _ = writeln!(
                            output,
                            "  {mark} {} {} {}",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation,
                            entry.address
                        );
                    }
                }
                output
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::AttributeSchema;

    fn secret_schema() -> ResourceSchema {
        ResourceSchema::new("test")
            .with_attribute("label", AttributeSchema::required_string())
            .with_attribute("secret_key", AttributeSchema::computed_string().sensitive())
    }

    #[test]
    fn test_redact_hides_sensitive_values() {
        let state = json!({"label": "ci", "secret_key": "hunter2"});
        let shown = redact(&secret_schema(), &state);
        assert_eq!(shown["label"], "ci");
        assert_eq!(shown["secret_key"], SENSITIVE);

        let unset = redact(&secret_schema(), &json!({"secret_key": null}));
        assert!(unset["secret_key"].is_null());
    }

    #[test]
    fn test_state_show_redacts_keys() {
        let registry = Registry::with_defaults();
        let mut state = ProviderState::new();
        state.set(
            "linode_object_storage_key",
            "ci",
            json!({"id": "1", "label": "ci", "secret_key": "hunter2"}),
            &json!({}),
        );

        for format in [OutputFormat::Text, OutputFormat::Json] {
            let out = OutputFormatter::new(format).format_state(&state, &registry, None);
            assert!(out.contains("linode_object_storage_key.ci"));
            assert!(!out.contains("hunter2"));
        }
        let one = OutputFormatter::new(OutputFormat::Text).format_state(
            &state,
            &registry,
            Some("linode_object_storage_key.ci"),
        );
        assert!(one.contains(SENSITIVE));
    }

    #[test]
    fn test_type_names() {
        let ty = AttributeType::list(AttributeType::map(AttributeType::Int64));
        assert_eq!(type_name(&ty), "list(map(int64))");
        assert_eq!(presence_name(Presence::OptionalComputed), "optional, computed");
    }

    #[test]
    fn test_types_lists_every_handler() {
        let out = OutputFormatter::new(OutputFormat::Text).format_types(&Registry::with_defaults());
        assert!(out.contains("linode_lke_cluster"));
        assert!(out.contains("data source"));
    }

    #[test]
    fn test_empty_plan_text() {
        let out = OutputFormatter::new(OutputFormat::Text)
            .format_plan(&DriverPlan::default(), &Registry::with_defaults());
        assert!(out.contains("No changes"));
    }
}
