//! Resource framework: typed attribute values, schemas, planning and
//! diagnostics.
//!
//! This module is independent of the Linode API. Resource implementations
//! declare a [`ResourceSchema`], decode host state into models built from
//! [`Value`]s, and report problems through [`Diagnostics`].

mod collections;
mod diagnostics;
mod plan;
mod schema;
mod semantic;
mod validators;
mod value;

pub use collections::{List, ListValue, Map, MapValue, Set, SetValue, list_of, map_of, set_of};
pub use diagnostics::{AttributePath, Diagnostic, Diagnostics, PathStep, Severity};
pub use plan::{AttributeChange, PlanAction, Planner, ResourcePlan};
pub use schema::{AttributeSchema, AttributeType, Presence, ResourceSchema};
pub use semantic::{
    DNS_TTL_LADDER, SemanticRule, dns_ttl_equal, keep_if_semantically_equal, record_name_equal,
    round_dns_ttl, semantic_equal,
};
pub use validators::Validator;
pub use value::{
    BoolValue, Float64Value, Int64Value, StringValue, UNKNOWN_MARKER, Value, collapse_unknowns,
    contains_unknown, is_unknown_marker, keep_or_update, unknown_marker,
};
