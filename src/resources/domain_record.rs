//! `linode_domain_record`: one record inside a DNS zone.
//!
//! The API returns record names relative to the zone, so a declared
//! `www.example.com` comes back as `www`. Refresh keeps the declared form
//! whenever the two agree once the zone suffix is stripped, which needs a
//! lookup of the parent domain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::framework::{
    AttributeSchema, AttributeType, Int64Value, ResourceSchema, SemanticRule, StringValue,
    Validator, Value, dns_ttl_equal, record_name_equal,
};
use crate::linode::{DomainRecord, DomainRecordOptions};
use crate::provider::{
    CreateRequest, DeleteRequest, OpContext, ProviderMeta, ReadRequest, Resource,
    ResourceResponse, UpdateRequest, decode_model, encode_model,
};

use super::helpers::{ignore_not_found, merge, merge_semantic, read_not_found};

const RECORD_TYPES: [&str; 9] = ["A", "AAAA", "NS", "MX", "CNAME", "TXT", "SRV", "PTR", "CAA"];

/// State of a `linode_domain_record`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainRecordModel {
    /// Record id.
    pub id: Int64Value,
    /// Parent domain id.
    pub domain_id: Int64Value,
    /// Record name, relative or fully qualified.
    pub name: StringValue,
    /// Record type.
    pub record_type: StringValue,
    /// TTL in seconds.
    pub ttl_sec: Int64Value,
    /// Target.
    pub target: StringValue,
    /// MX/SRV priority.
    pub priority: Int64Value,
    /// SRV weight.
    pub weight: Int64Value,
    /// SRV port.
    pub port: Int64Value,
    /// SRV protocol.
    pub protocol: StringValue,
    /// SRV service.
    pub service: StringValue,
    /// CAA tag.
    pub tag: StringValue,
}

fn target_eq(declared: &str, refreshed: &str) -> bool {
    let declared = declared.strip_suffix('.').unwrap_or(declared);
    declared.eq_ignore_ascii_case(refreshed)
}

impl DomainRecordModel {
    fn ids(&self) -> Result<(i64, i64)> {
        match (self.domain_id.as_known(), self.id.as_known()) {
            (Some(domain_id), Some(id)) => Ok((*domain_id, *id)),
            _ => Err(ConfigError::validation("domain_id and id must be known", "id").into()),
        }
    }

    /// Merges an API record into the model. `zone` is the parent domain
    /// name, needed only when the names differ textually.
    pub fn flatten(&mut self, record: &DomainRecord, zone: Option<&str>, preserve_known: bool) {
        merge(&mut self.id, Value::known(record.id), preserve_known);

        let keep_name = match (self.name.as_known(), zone) {
            (Some(declared), Some(zone)) => record_name_equal(declared, &record.name, zone),
            (Some(declared), None) => declared == &record.name,
            _ => false,
        };
        if !keep_name {
            merge(&mut self.name, Value::known(record.name.clone()), preserve_known);
        }

        merge(&mut self.record_type, Value::known(record.record_type.clone()), preserve_known);
        merge_semantic(&mut self.ttl_sec, record.ttl_sec, preserve_known, |a, b| dns_ttl_equal(*a, *b));
        merge_semantic(&mut self.target, record.target.clone(), preserve_known, |a, b| {
            target_eq(a, b)
        });
        merge(&mut self.priority, Value::known(record.priority), preserve_known);
        merge(&mut self.weight, Value::known(record.weight), preserve_known);
        merge(&mut self.port, Value::known(record.port), preserve_known);
        merge(&mut self.protocol, Value::from_option(record.protocol.clone()), preserve_known);
        merge(&mut self.service, Value::from_option(record.service.clone()), preserve_known);
        merge(&mut self.tag, Value::from_option(record.tag.clone()), preserve_known);
    }

    /// Builds create/update options from the model.
    #[must_use]
    pub fn options(&self) -> DomainRecordOptions {
        DomainRecordOptions {
            record_type: self.record_type.as_known().cloned(),
            name: self.name.as_known().cloned(),
            target: self.target.as_known().cloned(),
            priority: self.priority.as_known().copied(),
            weight: self.weight.as_known().copied(),
            port: self.port.as_known().copied(),
            service: self.service.as_known().cloned(),
            protocol: self.protocol.as_known().cloned(),
            ttl_sec: self.ttl_sec.as_known().copied(),
            tag: self.tag.as_known().cloned(),
        }
    }

    /// True when the declared name can only be reconciled with the
    /// refreshed one through the zone name.
    fn needs_zone(&self, record: &DomainRecord) -> bool {
        self.name.as_known().is_some_and(|name| name != &record.name)
    }
}

/// Fetches the parent zone name when the refreshed record name differs
/// from the declared one.
async fn zone_for(
    ctx: &OpContext,
    meta: &ProviderMeta,
    model: &DomainRecordModel,
    record: &DomainRecord,
    domain_id: i64,
) -> Result<Option<String>> {
    if !model.needs_zone(record) {
        return Ok(None);
    }
    debug!("Resolving zone of domain {} to compare record names", domain_id);
    Ok(Some(meta.client.get_domain(ctx, domain_id).await?.domain))
}

fn schema() -> ResourceSchema {
    ResourceSchema::new("Manages a record inside a Linode Domain.")
        .with_attribute("id", AttributeSchema::id(AttributeType::Int64))
        .with_attribute(
            "domain_id",
            AttributeSchema::required_int64()
                .force_replace()
                .with_description("The ID of the Domain to access."),
        )
        .with_attribute(
            "name",
            AttributeSchema::optional_string()
                .computed()
                .use_state_for_unknown()
                .with_validator(Validator::LengthBetween(0, 100))
                .with_description("The name of this Record; generated for SRV records."),
        )
        .with_attribute(
            "record_type",
            AttributeSchema::required_string()
                .force_replace()
                .with_validator(Validator::one_of(&RECORD_TYPES)),
        )
        .with_attribute(
            "ttl_sec",
            AttributeSchema::optional_int64()
                .computed()
                .with_semantic(SemanticRule::DnsTtl),
        )
        .with_attribute(
            "target",
            AttributeSchema::required_string().with_semantic(SemanticRule::CaseInsensitive),
        )
        .with_attribute(
            "priority",
            AttributeSchema::optional_int64()
                .computed()
                .use_state_for_unknown()
                .with_validator(Validator::IntBetween(0, 255)),
        )
        .with_attribute("protocol", AttributeSchema::optional_string())
        .with_attribute("service", AttributeSchema::optional_string())
        .with_attribute("tag", AttributeSchema::optional_string())
        .with_attribute(
            "port",
            AttributeSchema::optional_int64().computed().use_state_for_unknown(),
        )
        .with_attribute(
            "weight",
            AttributeSchema::optional_int64().computed().use_state_for_unknown(),
        )
}

/// Handler for `linode_domain_record`.
#[derive(Debug)]
pub struct DomainRecordResource {
    schema: ResourceSchema,
}

impl DomainRecordResource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for DomainRecordResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for DomainRecordResource {
    fn name(&self) -> &'static str {
        "linode_domain_record"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    async fn create(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: CreateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut plan: DomainRecordModel = decode_model(&req.planned)?;
        let domain_id = plan
            .domain_id
            .as_known()
            .copied()
            .ok_or_else(|| ConfigError::validation("domain_id must be known", "domain_id"))?;

        let record = meta
            .client
            .create_domain_record(ctx, domain_id, &plan.options())
            .await?;
        debug!("Created record {} in domain {}", record.id, domain_id);

        plan.id = meta.settle_id(plan.id, record.id);
        resp.state = Some(encode_model(&plan)?);

        let zone = zone_for(ctx, meta, &plan, &record, domain_id).await?;
        plan.flatten(&record, zone.as_deref(), true);
        resp.state = Some(encode_model(&plan)?);
        Ok(())
    }

    async fn read(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: ReadRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut state: DomainRecordModel = decode_model(&req.state)?;
        let (domain_id, id) = state.ids()?;

        let record = match meta.client.get_domain_record(ctx, domain_id, id).await {
            Ok(record) => record,
            Err(err) => return read_not_found(err, resp, "Domain Record", id),
        };
        let zone = zone_for(ctx, meta, &state, &record, domain_id).await?;
        state.flatten(&record, zone.as_deref(), false);
        resp.state = Some(encode_model(&state)?);
        Ok(())
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let prior: DomainRecordModel = decode_model(&req.prior)?;
        let mut plan: DomainRecordModel = decode_model(&req.planned)?;
        let (domain_id, id) = prior.ids()?;

        let record = meta
            .client
            .update_domain_record(ctx, domain_id, id, &plan.options())
            .await?;
        let zone = zone_for(ctx, meta, &plan, &record, domain_id).await?;
        plan.flatten(&record, zone.as_deref(), true);
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
        let state: DomainRecordModel = decode_model(&req.state)?;
        let (domain_id, id) = state.ids()?;
        ignore_not_found(meta.client.delete_domain_record(ctx, domain_id, id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Planner;
    use crate::linode::test_config;
    use serde_json::{Value as Json, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_record(name: &str) -> Json {
        json!({
            "id": 77, "type": "A", "name": name, "target": "10.0.0.1",
            "priority": 0, "weight": 0, "port": 0, "ttl_sec": 300,
            "service": null, "protocol": null, "tag": null,
        })
    }

    async fn mock_zone(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v4/domains/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5, "domain": "example.com", "type": "master",
            })))
            .mount(server)
            .await;
    }

    fn meta(server: &MockServer) -> ProviderMeta {
        ProviderMeta::new(test_config(server)).expect("meta")
    }

    #[tokio::test]
    async fn test_create_keeps_fully_qualified_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/domains/5/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_record("sub")))
            .mount(&server)
            .await;
        mock_zone(&server).await;

        let resource = DomainRecordResource::new();
        let config = json!({
            "domain_id": 5, "name": "sub.example.com", "record_type": "A",
            "target": "10.0.0.1", "ttl_sec": 300,
        });
        let plan = Planner::new(resource.schema()).plan(None, &config);
        let mut resp = ResourceResponse::default();
        resource
            .create(
                &OpContext::background(),
                &meta(&server),
                CreateRequest {
                    planned: plan.planned_state,
                    config,
                },
                &mut resp,
            )
            .await
            .expect("create");

        let state = resp.state.expect("state");
        assert_eq!(state["id"], 77);
        assert_eq!(state["name"], "sub.example.com");
        assert_eq!(state["priority"], 0);
    }

    #[tokio::test]
    async fn test_refresh_preserves_declared_fqdn() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/domains/5/records/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_record("sub")))
            .mount(&server)
            .await;
        mock_zone(&server).await;

        let prior = json!({
            "id": 77, "domain_id": 5, "name": "sub.example.com", "record_type": "A",
            "target": "10.0.0.1", "ttl_sec": 300,
        });
        let mut resp = ResourceResponse::with_state(prior.clone());
        DomainRecordResource::new()
            .read(&OpContext::background(), &meta(&server), ReadRequest { state: prior }, &mut resp)
            .await
            .expect("read");
        assert_eq!(resp.state.expect("state")["name"], "sub.example.com");
    }

    #[tokio::test]
    async fn test_refresh_reports_renamed_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/domains/5/records/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_record("other")))
            .mount(&server)
            .await;
        mock_zone(&server).await;

        let prior = json!({
            "id": 77, "domain_id": 5, "name": "sub.example.com", "record_type": "A",
            "target": "10.0.0.1",
        });
        let mut resp = ResourceResponse::with_state(prior.clone());
        DomainRecordResource::new()
            .read(&OpContext::background(), &meta(&server), ReadRequest { state: prior }, &mut resp)
            .await
            .expect("read");
        let state = resp.state.expect("state");
        assert_eq!(state["name"], "other");
        assert_eq!(state["ttl_sec"], 300);
    }

    #[test]
    fn test_type_change_forces_replace() {
        let resource = DomainRecordResource::new();
        let prior = json!({
            "id": 77, "domain_id": 5, "name": "sub", "record_type": "A",
            "target": "10.0.0.1", "ttl_sec": 300, "priority": 0, "weight": 0, "port": 0,
        });
        let config = json!({
            "domain_id": 5, "name": "sub", "record_type": "CNAME", "target": "10.0.0.1",
        });
        let plan = Planner::new(resource.schema()).plan(Some(&prior), &config);
        assert!(plan.requires_replace());
    }

    #[test]
    fn test_target_trailing_dot() {
        assert!(target_eq("host.example.com.", "host.example.com"));
        assert!(target_eq("Host.example.com", "host.example.com"));
        assert!(!target_eq("a.example.com", "b.example.com"));
    }
}
