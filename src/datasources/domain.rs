//! `linode_domain` data source: a zone looked up by id or by name.

use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{ApiError, ConfigError, Result};
use crate::framework::{AttributeSchema, AttributeType, Diagnostics, Presence, ResourceSchema, StringValue};
use crate::linode::{Domain, Filter};
use crate::provider::{DataSource, OpContext, ProviderMeta, decode_model, encode_model};
use crate::resources::DomainModel;

fn schema() -> ResourceSchema {
    let computed = || AttributeSchema::computed_string();
    let seconds = || AttributeSchema::computed_int64();
    let strings = || AttributeSchema::new(AttributeType::set(AttributeType::String), Presence::Computed);
    ResourceSchema::new("Provides information about a Linode Domain.")
        .with_attribute(
            "id",
            AttributeSchema::optional_string()
                .computed()
                .with_description("The unique ID of this Domain."),
        )
        .with_attribute(
            "domain",
            AttributeSchema::optional_string()
                .computed()
                .with_description("The domain this Domain represents."),
        )
        .with_attribute("type", computed())
        .with_attribute("group", computed())
        .with_attribute("status", computed())
        .with_attribute("description", computed())
        .with_attribute("master_ips", strings())
        .with_attribute("axfr_ips", strings())
        .with_attribute("ttl_sec", seconds())
        .with_attribute("retry_sec", seconds())
        .with_attribute("expire_sec", seconds())
        .with_attribute("refresh_sec", seconds())
        .with_attribute("soa_email", computed())
        .with_attribute("tags", strings())
}

/// Handler for the `linode_domain` data source.
#[derive(Debug)]
pub struct DomainDataSource {
    schema: ResourceSchema,
}

impl DomainDataSource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }

    async fn find_by_name(ctx: &OpContext, meta: &ProviderMeta, name: &str) -> Result<Domain> {
        let filter = Filter::new().eq("domain", name);
        let domains = meta.client.list_domains(ctx, Some(&filter)).await?;
        debug!("Domain filter {} matched {} domains", name, domains.len());
        domains
            .into_iter()
            .find(|domain| domain.domain.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                ApiError::NotFound {
                    path: format!("domains?domain={name}"),
                }
                .into()
            })
    }
}

impl Default for DomainDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for DomainDataSource {
    fn name(&self) -> &'static str {
        "linode_domain"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    async fn read(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        config: Json,
        _diags: &mut Diagnostics,
    ) -> Result<Json> {
        let mut model: DomainModel = decode_model(&config)?;
        let domain = match (model.id.as_known(), model.domain.as_known()) {
            (Some(id), _) => {
                let id = id
                    .parse()
                    .map_err(|_| ConfigError::validation(format!("invalid domain id {id:?}"), "id"))?;
                meta.client.get_domain(ctx, id).await?
            }
            (None, Some(name)) => Self::find_by_name(ctx, meta, name).await?,
            (None, None) => {
                return Err(ConfigError::validation("Domain or Domain ID is required", "domain").into());
            }
        };

        model.id = StringValue::from(domain.id.to_string().as_str());
        model.flatten(&domain, false);
        encode_model(&model)
    }
}
