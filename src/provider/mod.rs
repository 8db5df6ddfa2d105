//! Provider host layer.
//!
//! Owns the shared [`ProviderMeta`], the handler [`Registry`] and the
//! [`Provider`] facade that turns host calls into resource operations:
//! planning with resource hooks, per-kind timeouts, error-to-diagnostic
//! conversion and unknown collapse on returned state.

mod context;
mod host;
mod meta;
mod registry;
mod resource;
mod timeouts;

pub use context::OpContext;
pub use host::Provider;
pub use meta::{ProviderMeta, carry_over_prior, decode_model, encode_model};
pub use registry::Registry;
pub use resource::{
    CreateRequest, DataSource, DeleteRequest, ReadRequest, Resource, ResourceResponse,
    UpdateRequest,
};
pub use timeouts::{Operation, Timeouts};
