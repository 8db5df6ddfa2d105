//! `linode_domain`: a DNS zone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::info;

use crate::error::Result;
use crate::framework::{
    AttributePath, AttributeSchema, AttributeType, Diagnostics, Int64Value, Presence, ResourceSchema,
    SemanticRule, SetValue, StringValue, Validator, Value, dns_ttl_equal,
};
use crate::linode::{Domain, DomainOptions};
use crate::provider::{
    CreateRequest, DeleteRequest, OpContext, ProviderMeta, ReadRequest, Resource,
    ResourceResponse, UpdateRequest, decode_model, encode_model,
};

use super::helpers::{
    ignore_not_found, int_or_null, merge, merge_semantic, parse_id, read_not_found,
    refreshed_set, string_or_null, strings,
};

const SECONDS_HINT: &str = "Valid values are 0, 300, 3600, 7200, 14400, 28800, 57600, 86400, \
    172800, 345600, 604800, 1209600 and 2419200; any other value is rounded up to the next valid value.";

/// State of a `linode_domain`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainModel {
    /// Domain id.
    pub id: StringValue,
    /// Zone name.
    pub domain: StringValue,
    /// `master` or `slave`.
    #[serde(rename = "type")]
    pub domain_type: StringValue,
    /// Display group.
    pub group: StringValue,
    /// `active`, `disabled` or `edit_mode`.
    pub status: StringValue,
    /// Display description.
    pub description: StringValue,
    /// Primary name servers of a secondary zone.
    pub master_ips: SetValue<String>,
    /// Addresses allowed to transfer the zone.
    pub axfr_ips: SetValue<String>,
    /// Default record TTL.
    pub ttl_sec: Int64Value,
    /// SOA retry.
    pub retry_sec: Int64Value,
    /// SOA expire.
    pub expire_sec: Int64Value,
    /// SOA refresh.
    pub refresh_sec: Int64Value,
    /// SOA email.
    pub soa_email: StringValue,
    /// Tags.
    pub tags: SetValue<String>,
}

fn ttl_eq(a: &i64, b: &i64) -> bool {
    dns_ttl_equal(*a, *b)
}

impl DomainModel {
    /// Merges an API domain into the model.
    pub fn flatten(&mut self, domain: &Domain, preserve_known: bool) {
        merge(&mut self.id, Value::known(domain.id.to_string()), preserve_known);
        merge(&mut self.domain, Value::known(domain.domain.clone()), preserve_known);
        merge(&mut self.domain_type, Value::known(domain.domain_type.clone()), preserve_known);
        merge(&mut self.group, string_or_null(&domain.group), preserve_known);
        merge(&mut self.status, string_or_null(&domain.status), preserve_known);
        merge(&mut self.description, string_or_null(&domain.description), preserve_known);
        merge(&mut self.soa_email, string_or_null(&domain.soa_email), preserve_known);

        let master_ips = refreshed_set(&self.master_ips, &domain.master_ips);
        merge(&mut self.master_ips, master_ips, preserve_known);
        let axfr_ips = refreshed_set(&self.axfr_ips, &domain.axfr_ips);
        merge(&mut self.axfr_ips, axfr_ips, preserve_known);
        let tags = refreshed_set(&self.tags, &domain.tags);
        merge(&mut self.tags, tags, preserve_known);

        for (slot, refreshed) in [
            (&mut self.ttl_sec, domain.ttl_sec),
            (&mut self.retry_sec, domain.retry_sec),
            (&mut self.expire_sec, domain.expire_sec),
            (&mut self.refresh_sec, domain.refresh_sec),
        ] {
            if refreshed == 0 && !slot.is_known() {
                merge(slot, int_or_null(refreshed), preserve_known);
            } else {
                merge_semantic(slot, refreshed, preserve_known, ttl_eq);
            }
        }
    }

    /// Builds create/update options from the model.
    ///
    /// # Errors
    ///
    /// Returns an error if a set attribute holds unknown elements.
    pub fn options(&self) -> Result<DomainOptions> {
        let known_int = |v: &Int64Value| v.as_known().copied();
        let known_str = |v: &StringValue| v.as_known().cloned();
        // A null description or group is sent as "" so clearing reaches the API.
        let clearable = |v: &StringValue| match v {
            Value::Unknown => None,
            Value::Null => Some(String::new()),
            Value::Known(s) => Some(s.clone()),
        };
        Ok(DomainOptions {
            domain: known_str(&self.domain),
            domain_type: known_str(&self.domain_type),
            soa_email: known_str(&self.soa_email),
            description: clearable(&self.description),
            group: clearable(&self.group),
            status: known_str(&self.status),
            master_ips: Some(strings(&self.master_ips, "master_ips")?),
            axfr_ips: Some(strings(&self.axfr_ips, "axfr_ips")?),
            ttl_sec: known_int(&self.ttl_sec),
            refresh_sec: known_int(&self.refresh_sec),
            retry_sec: known_int(&self.retry_sec),
            expire_sec: known_int(&self.expire_sec),
            tags: Some(strings(&self.tags, "tags")?),
        })
    }
}

fn seconds(description: &str) -> AttributeSchema {
    AttributeSchema::optional_int64()
        .with_semantic(SemanticRule::DnsTtl)
        .with_validator(Validator::IntAtLeast(0))
        .with_description(format!("{description} {SECONDS_HINT}"))
}

fn schema() -> ResourceSchema {
    let strings = || AttributeType::set(AttributeType::String);
    ResourceSchema::new("Manages a Linode Domain.")
        .with_attribute("id", AttributeSchema::id(AttributeType::String))
        .with_attribute(
            "domain",
            AttributeSchema::required_string()
                .with_description("The domain this Domain represents. Must be unique."),
        )
        .with_attribute(
            "type",
            AttributeSchema::optional_string()
                .with_default("master")
                .force_replace()
                .use_state_for_unknown()
                .with_validator(Validator::one_of(&["master", "slave"]))
                .with_description("Whether this Domain is authoritative (master) or a read-only copy (slave)."),
        )
        .with_attribute(
            "group",
            AttributeSchema::optional_string().with_validator(Validator::LengthBetween(0, 50)),
        )
        .with_attribute(
            "status",
            AttributeSchema::optional_string()
                .with_default("active")
                .with_validator(Validator::one_of(&["disabled", "active", "edit_mode"])),
        )
        .with_attribute(
            "description",
            AttributeSchema::optional_string().with_validator(Validator::LengthBetween(0, 50)),
        )
        .with_attribute(
            "master_ips",
            AttributeSchema::new(strings(), Presence::Optional)
                .with_description("The IP addresses representing the master DNS for this Domain."),
        )
        .with_attribute(
            "axfr_ips",
            AttributeSchema::new(strings(), Presence::Optional)
                .with_description("The IPs that may perform a zone transfer for this Domain."),
        )
        .with_attribute("ttl_sec", seconds("Default TTL of the zone's records."))
        .with_attribute("retry_sec", seconds("Interval at which a failed refresh is retried."))
        .with_attribute("expire_sec", seconds("Time after which the zone is no longer authoritative."))
        .with_attribute("refresh_sec", seconds("Time before the zone should be refreshed."))
        .with_attribute(
            "soa_email",
            AttributeSchema::optional_string()
                .with_description("Start of Authority email address. Required for master Domains."),
        )
        .with_attribute(
            "tags",
            AttributeSchema::new(strings(), Presence::Optional),
        )
}

/// Handler for `linode_domain`.
#[derive(Debug)]
pub struct DomainResource {
    schema: ResourceSchema,
}

impl DomainResource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for DomainResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for DomainResource {
    fn name(&self) -> &'static str {
        "linode_domain"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn validate_config(&self, config: &Json, diags: &mut Diagnostics) {
        let domain_type = config.get("type").and_then(Json::as_str).unwrap_or("master");
        let is_set = |name: &str| config.get(name).is_some_and(|v| !v.is_null());
        match domain_type {
            "master" if !is_set("soa_email") => diags.add_attribute_error(
                AttributePath::root("soa_email"),
                "Missing Attribute",
                "soa_email is required for master domains",
            ),
            "slave" if !is_set("master_ips") => diags.add_attribute_error(
                AttributePath::root("master_ips"),
                "Missing Attribute",
                "master_ips is required for slave domains",
            ),
            _ => {}
        }
    }

    async fn create(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: CreateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut model: DomainModel = decode_model(&req.planned)?;
        let domain = meta.client.create_domain(ctx, &model.options()?).await?;
        info!("Created domain {} ({})", domain.domain, domain.id);

        model.id = meta.settle_id(model.id, domain.id.to_string());
        model.flatten(&domain, true);
        resp.state = Some(encode_model(&model)?);
        Ok(())
    }

    async fn read(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: ReadRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut model: DomainModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        match meta.client.get_domain(ctx, id).await {
            Ok(domain) => {
                model.flatten(&domain, false);
                resp.state = Some(encode_model(&model)?);
                Ok(())
            }
            Err(err) => read_not_found(err, resp, "Domain", id),
        }
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let prior: DomainModel = decode_model(&req.prior)?;
        let mut plan: DomainModel = decode_model(&req.planned)?;
        let id = parse_id(&prior.id)?;

        plan.id = plan.id.fill_unknown(prior.id.clone());
        if plan == prior {
            return Ok(());
        }

        let domain = meta.client.update_domain(ctx, id, &plan.options()?).await?;
        plan.flatten(&domain, true);
        resp.state = Some(encode_model(&plan)?);
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: DeleteRequest,
        _resp: &mut ResourceResponse,
    ) -> Result<()> {
        let model: DomainModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        ignore_not_found(meta.client.delete_domain(ctx, id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::framework::set_of;
    use crate::linode::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_domain(ttl: i64) -> Json {
        json!({
            "id": 1234, "domain": "example.com", "type": "master", "status": "active",
            "soa_email": "admin@example.com", "description": "", "group": "",
            "master_ips": [], "axfr_ips": [], "ttl_sec": ttl, "refresh_sec": 0,
            "retry_sec": 0, "expire_sec": 0, "tags": ["prod"],
        })
    }

    fn meta(config: ProviderConfig) -> ProviderMeta {
        ProviderMeta::new(config).expect("meta")
    }

    #[tokio::test]
    async fn test_create_keeps_declared_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/domains"))
            .and(body_partial_json(json!({"domain": "example.com", "ttl_sec": 301})))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_domain(3600)))
            .expect(1)
            .mount(&server)
            .await;

        let resource = DomainResource::new();
        let config = json!({
            "domain": "example.com", "soa_email": "admin@example.com",
            "ttl_sec": 301, "tags": ["prod"],
        });
        let plan = crate::framework::Planner::new(resource.schema()).plan(None, &config);
        let mut resp = ResourceResponse::default();
        resource
            .create(
                &OpContext::background(),
                &meta(test_config(&server)),
                CreateRequest {
                    planned: plan.planned_state,
                    config,
                },
                &mut resp,
            )
            .await
            .expect("create");

        let state: DomainModel = decode_model(&resp.state.expect("state")).expect("model");
        assert_eq!(state.id, StringValue::from("1234"));
        assert_eq!(state.ttl_sec, Value::known(301));
        assert_eq!(state.domain_type, StringValue::from("master"));
        assert_eq!(state.tags, set_of([String::from("prod")]));
        assert!(state.group.is_null());
    }

    #[tokio::test]
    async fn test_update_clears_description() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v4/domains/1234"))
            .and(body_partial_json(json!({"description": ""})))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_domain(3600)))
            .expect(1)
            .mount(&server)
            .await;

        let resource = DomainResource::new();
        let prior = json!({
            "id": "1234", "domain": "example.com", "type": "master", "status": "active",
            "soa_email": "admin@example.com", "description": "old", "ttl_sec": 3600,
            "tags": ["prod"],
        });
        let config = json!({
            "domain": "example.com", "soa_email": "admin@example.com",
            "ttl_sec": 3600, "tags": ["prod"],
        });
        let plan = crate::framework::Planner::new(resource.schema()).plan(Some(&prior), &config);
        assert!(plan.has_changes());

        let mut resp = ResourceResponse::with_state(prior.clone());
        resource
            .update(
                &OpContext::background(),
                &meta(test_config(&server)),
                UpdateRequest {
                    prior,
                    planned: plan.planned_state,
                    config,
                },
                &mut resp,
            )
            .await
            .expect("update");

        let state = resp.state.expect("state");
        assert!(state["description"].is_null());
    }

    #[tokio::test]
    async fn test_read_detects_real_ttl_drift() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/domains/1234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_domain(7200)))
            .mount(&server)
            .await;

        let prior = json!({"id": "1234", "domain": "example.com", "ttl_sec": 301});
        let mut resp = ResourceResponse::with_state(prior.clone());
        DomainResource::new()
            .read(
                &OpContext::background(),
                &meta(test_config(&server)),
                ReadRequest { state: prior },
                &mut resp,
            )
            .await
            .expect("read");

        let state = resp.state.expect("state");
        assert_eq!(state["ttl_sec"], 7200);
        assert_eq!(state["soa_email"], "admin@example.com");
    }

    #[tokio::test]
    async fn test_read_missing_domain_is_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/domains/9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": [{"reason": "Not found"}]})))
            .mount(&server)
            .await;

        let state = json!({"id": "9", "domain": "gone.com"});
        let mut resp = ResourceResponse::with_state(state.clone());
        DomainResource::new()
            .read(&OpContext::background(), &meta(test_config(&server)), ReadRequest { state }, &mut resp)
            .await
            .expect("404 is not an error");
        assert!(resp.state.is_none());
        assert_eq!(resp.diagnostics.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_delete_tolerates_404() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v4/domains/9"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let state = json!({"id": "9"});
        DomainResource::new()
            .delete(
                &OpContext::background(),
                &meta(test_config(&server)),
                DeleteRequest { state },
                &mut ResourceResponse::default(),
            )
            .await
            .expect("delete");
    }

    #[test]
    fn test_master_requires_soa_email() {
        let resource = DomainResource::new();
        let mut diags = Diagnostics::new();
        resource.validate_config(&json!({"domain": "example.com"}), &mut diags);
        assert!(diags.has_error());

        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"domain": "example.com", "type": "slave", "master_ips": ["10.0.0.1"]}),
            &mut diags,
        );
        assert!(!diags.has_error());
    }

    #[test]
    fn test_ttl_rounding_is_not_drift() {
        let resource = DomainResource::new();
        let prior = json!({
            "id": "1", "domain": "example.com", "type": "master", "status": "active",
            "soa_email": "a@example.com", "ttl_sec": 3600,
        });
        let config = json!({"domain": "example.com", "soa_email": "a@example.com", "ttl_sec": 301});
        let plan = crate::framework::Planner::new(resource.schema()).plan(Some(&prior), &config);
        assert!(!plan.has_changes());
    }
}
