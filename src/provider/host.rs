//! The provider facade the host drives.

use serde_json::Value as Json;
use tracing::{Instrument, debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::framework::{
    Diagnostics, PlanAction, Planner, ResourcePlan, collapse_unknowns,
};

use super::context::OpContext;
use super::meta::ProviderMeta;
use super::registry::Registry;
use super::resource::{
    CreateRequest, DeleteRequest, ReadRequest, Resource, ResourceResponse, UpdateRequest,
};
use super::timeouts::{Operation, Timeouts};

/// Entry point for planning and applying resource operations.
#[derive(Debug, Clone)]
pub struct Provider {
    meta: ProviderMeta,
    registry: Registry,
}

impl Provider {
    /// Creates a provider with every built-in handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self::with_registry(ProviderMeta::new(config)?, Registry::with_defaults()))
    }

    /// Creates a provider from explicit parts.
    #[must_use]
    pub const fn with_registry(meta: ProviderMeta, registry: Registry) -> Self {
        Self { meta, registry }
    }

    /// Shared provider state.
    #[must_use]
    pub const fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    /// Handler registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validates a resource configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown.
    pub fn validate(&self, type_name: &str, config: &Json) -> Result<Diagnostics> {
        self.registry.validate(type_name, config)
    }

    /// Plans a resource configuration against its prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown.
    pub fn plan(&self, type_name: &str, prior: Option<&Json>, config: &Json) -> Result<ResourcePlan> {
        let resource = self.registry.resource(type_name)?;

        let mut diags = Diagnostics::new();
        resource.validate_config(config, &mut diags);
        if diags.has_error() {
            return Ok(ResourcePlan {
                action: PlanAction::NoChange,
                planned_state: Json::Null,
                changes: Vec::new(),
                diagnostics: diags,
            });
        }

        let mut plan = Planner::new(resource.schema()).plan_with(prior, config, |planned, prior, d| {
            resource.modify_plan(planned, prior, d);
        });
        diags.append(plan.diagnostics);
        plan.diagnostics = diags;

        debug!("Planned {} {} ({} changes)", plan.action, type_name, plan.changes.len());
        Ok(plan)
    }

    fn context(resource: &dyn Resource, operation: Operation) -> OpContext {
        OpContext::new(resource.name(), &operation.to_string())
            .with_timeout(resource.timeouts().for_operation(operation))
    }

    fn finish(
        resource: &dyn Resource,
        operation: Operation,
        outcome: Result<()>,
        mut resp: ResourceResponse,
        prior: Option<&Json>,
    ) -> ResourceResponse {
        if let Err(err) = outcome {
            warn!("Failed to {} {}: {}", operation, resource.name(), err);
            resp.diagnostics
                .add_error_from(format!("Failed to {operation} {}", resource.name()), &err);
        }
        resp.state = resp.state.map(|state| collapse_unknowns(state, prior));
        resp
    }

    /// Creates a resource from a planned state.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown; handler failures
    /// are reported as diagnostics.
    pub async fn create(&self, type_name: &str, planned: Json, config: Json) -> Result<ResourceResponse> {
        let resource = self.registry.resource(type_name)?;
        let ctx = Self::context(resource.as_ref(), Operation::Create);
        info!("Creating {}", type_name);

        let mut resp = ResourceResponse::default();
        let outcome = resource
            .create(&ctx, &self.meta, CreateRequest { planned, config }, &mut resp)
            .instrument(ctx.span().clone())
            .await;
        Ok(Self::finish(resource.as_ref(), Operation::Create, outcome, resp, None))
    }

    /// Refreshes a resource.
    ///
    /// A record whose `id` is the empty string is dropped without calling
    /// the API.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown.
    pub async fn read(&self, type_name: &str, state: Json) -> Result<ResourceResponse> {
        let resource = self.registry.resource(type_name)?;

        if state.get("id").and_then(Json::as_str) == Some("") {
            warn!("Removing {} with an empty id from state", type_name);
            return Ok(ResourceResponse::default());
        }

        let ctx = Self::context(resource.as_ref(), Operation::Read);
        let mut resp = ResourceResponse::with_state(state.clone());
        let outcome = resource
            .read(&ctx, &self.meta, ReadRequest { state: state.clone() }, &mut resp)
            .instrument(ctx.span().clone())
            .await;
        Ok(Self::finish(resource.as_ref(), Operation::Read, outcome, resp, Some(&state)))
    }

    /// Updates a resource in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown.
    pub async fn update(
        &self,
        type_name: &str,
        prior: Json,
        planned: Json,
        config: Json,
    ) -> Result<ResourceResponse> {
        let resource = self.registry.resource(type_name)?;
        let ctx = Self::context(resource.as_ref(), Operation::Update);
        info!("Updating {}", type_name);

        let mut resp = ResourceResponse::with_state(prior.clone());
        let req = UpdateRequest {
            prior: prior.clone(),
            planned,
            config,
        };
        let outcome = resource
            .update(&ctx, &self.meta, req, &mut resp)
            .instrument(ctx.span().clone())
            .await;
        if outcome.is_ok() {
            if let Some(state) = resp.state.as_mut() {
                self.meta.carry_over_prior(state, &prior);
            }
        }
        Ok(Self::finish(resource.as_ref(), Operation::Update, outcome, resp, Some(&prior)))
    }

    /// Deletes a resource. On success the returned state is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown.
    pub async fn delete(&self, type_name: &str, state: Json) -> Result<ResourceResponse> {
        let resource = self.registry.resource(type_name)?;
        let ctx = Self::context(resource.as_ref(), Operation::Delete);
        info!("Deleting {}", type_name);

        let mut resp = ResourceResponse::with_state(state.clone());
        let outcome = resource
            .delete(&ctx, &self.meta, DeleteRequest { state: state.clone() }, &mut resp)
            .instrument(ctx.span().clone())
            .await;
        if outcome.is_ok() {
            resp.remove();
        }
        Ok(Self::finish(resource.as_ref(), Operation::Delete, outcome, resp, Some(&state)))
    }

    /// Applies a computed plan.
    ///
    /// A replacement deletes first and only creates once the delete
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown or the plan needs a
    /// prior state that was not given.
    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<Json>,
        plan: &ResourcePlan,
        config: Json,
    ) -> Result<ResourceResponse> {
        if plan.diagnostics.has_error() {
            return Ok(ResourceResponse {
                state: prior,
                diagnostics: plan.diagnostics.clone(),
            });
        }

        let planned = plan.planned_state.clone();
        let mut resp = match (plan.action, prior) {
            (PlanAction::Create, _) => self.create(type_name, planned, config).await?,
            (PlanAction::Update, Some(prior)) => self.update(type_name, prior, planned, config).await?,
            (PlanAction::Replace, Some(prior)) => {
                let deleted = self.delete(type_name, prior).await?;
                if deleted.diagnostics.has_error() {
                    return Ok(deleted);
                }
                let mut created = self.create(type_name, planned, config).await?;
                let mut diags = deleted.diagnostics;
                diags.append(created.diagnostics);
                created.diagnostics = diags;
                created
            }
            (PlanAction::NoChange, prior) => ResourceResponse {
                state: prior,
                diagnostics: Diagnostics::new(),
            },
            (action, None) => {
                return Err(ProviderError::internal(format!(
                    "{action} of {type_name} requires a prior state"
                )));
            }
        };

        let mut diags = plan.diagnostics.clone();
        diags.append(resp.diagnostics);
        resp.diagnostics = diags;
        Ok(resp)
    }

    /// Reads a data source.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source type is unknown.
    pub async fn read_data_source(&self, type_name: &str, config: Json) -> Result<ResourceResponse> {
        let data_source = self.registry.data_source(type_name)?;
        let ctx = OpContext::new(type_name, "read")
            .with_timeout(Timeouts::DEFAULT.read);

        let diags = Planner::new(data_source.schema()).validate(&config);
        if diags.has_error() {
            return Ok(ResourceResponse {
                state: None,
                diagnostics: diags,
            });
        }

        let mut resp = ResourceResponse {
            state: None,
            diagnostics: diags,
        };
        match data_source
            .read(&ctx, &self.meta, config, &mut resp.diagnostics)
            .instrument(ctx.span().clone())
            .await
        {
            Ok(state) => resp.state = Some(collapse_unknowns(state, None)),
            Err(err) => resp
                .diagnostics
                .add_error_from(format!("Failed to read {type_name}"), &err),
        }
        Ok(resp)
    }
}
