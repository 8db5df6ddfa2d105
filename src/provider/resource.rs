//! Resource and data source handler traits.

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::Result;
use crate::framework::{Diagnostics, ResourceSchema};

use super::context::OpContext;
use super::meta::ProviderMeta;
use super::timeouts::Timeouts;

/// Input of [`Resource::create`].
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Planned state.
    pub planned: Json,
    /// Raw configuration the plan was computed from.
    pub config: Json,
}

/// Input of [`Resource::read`].
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Prior persisted state.
    pub state: Json,
}

/// Input of [`Resource::update`].
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Prior persisted state.
    pub prior: Json,
    /// Planned state.
    pub planned: Json,
    /// Raw configuration the plan was computed from.
    pub config: Json,
}

/// Input of [`Resource::delete`].
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// Prior persisted state.
    pub state: Json,
}

/// Output of every resource operation.
///
/// Handlers write `state` as soon as the server has assigned an id, so a
/// failure in a later wait still leaves the record tracked.
#[derive(Debug, Clone, Default)]
pub struct ResourceResponse {
    /// New state; `None` removes the resource from state.
    pub state: Option<Json>,
    /// Diagnostics produced by the handler.
    pub diagnostics: Diagnostics,
}

impl ResourceResponse {
    /// A response carrying `state`.
    #[must_use]
    pub fn with_state(state: Json) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Drops the resource from state.
    pub fn remove(&mut self) {
        self.state = None;
    }
}

/// A managed resource kind.
///
/// Handlers return `Err` for failures; the [`Provider`](super::Provider)
/// turns those into error diagnostics. A read that finds the remote object
/// gone reports a warning and calls [`ResourceResponse::remove`] instead.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Globally unique type name, e.g. `linode_domain`.
    fn name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> &ResourceSchema;

    /// Operation timeouts for this kind.
    fn timeouts(&self) -> Timeouts {
        Timeouts::DEFAULT
    }

    /// Cross-attribute checks run after the schema validators.
    fn validate_config(&self, _config: &Json, _diags: &mut Diagnostics) {}

    /// Resource-specific plan adjustments run after the generic modifiers.
    fn modify_plan(&self, _planned: &mut Json, _prior: Option<&Json>, _diags: &mut Diagnostics) {}

    /// Creates the remote object.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call or wait fails.
    async fn create(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: CreateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()>;

    /// Refreshes state from the remote object.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails for a reason other than 404.
    async fn read(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: ReadRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()>;

    /// Updates the remote object in place.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call or wait fails.
    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()>;

    /// Deletes the remote object. A 404 counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call or wait fails.
    async fn delete(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: DeleteRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()>;
}

/// A read-only lookup.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Globally unique type name.
    fn name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> &ResourceSchema;

    /// Resolves the configuration into a full record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn read(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        config: Json,
        diags: &mut Diagnostics,
    ) -> Result<Json>;
}
