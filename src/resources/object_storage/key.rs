//! `linode_object_storage_key`: an S3 access key pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::info;

use crate::error::Result;
use crate::framework::{
    AttributePath, AttributeSchema, AttributeType, BoolValue, Diagnostics, List, ListValue,
    Presence, ResourceSchema, StringValue, Validator, Value,
};
use crate::linode::{
    BucketAccess, ObjectStorageKey, ObjectStorageKeyCreateOptions, ObjectStorageKeyUpdateOptions,
};
use crate::provider::{
    CreateRequest, DeleteRequest, OpContext, ProviderMeta, ReadRequest, Resource,
    ResourceResponse, UpdateRequest, decode_model, encode_model,
};
use crate::resources::helpers::{converted, ignore_not_found, merge, parse_id, read_not_found};

/// One bucket grant of a limited key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketAccessModel {
    /// Bucket label.
    pub bucket_name: StringValue,
    /// Bucket region.
    pub region: StringValue,
    /// Legacy bucket cluster.
    pub cluster: StringValue,
    /// `read_only` or `read_write`.
    pub permissions: StringValue,
}

impl BucketAccessModel {
    fn to_api(&self) -> BucketAccess {
        BucketAccess {
            bucket_name: self.bucket_name.as_str().to_string(),
            cluster: self.cluster.as_known().cloned(),
            region: self.region.as_known().cloned(),
            permissions: self.permissions.as_str().to_string(),
        }
    }

    fn from_api(access: &BucketAccess) -> Self {
        let region = Value::from_option(access.region.clone());
        let cluster = if region.is_known() {
            Value::Null
        } else {
            Value::from_option(access.cluster.clone())
        };
        Self {
            bucket_name: Value::known(access.bucket_name.clone()),
            region,
            cluster,
            permissions: Value::known(access.permissions.clone()),
        }
    }

    /// Same grant as `access`, ignoring which location fields are echoed.
    fn grants(&self, access: &BucketAccess) -> bool {
        let location = self.region.as_known().or_else(|| self.cluster.as_known());
        let matches_location = location.is_none_or(|loc| {
            access.region.as_ref() == Some(loc) || access.cluster.as_ref() == Some(loc)
        });
        self.bucket_name.as_str() == access.bucket_name
            && self.permissions.as_str() == access.permissions
            && matches_location
    }
}

/// State of a `linode_object_storage_key`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageKeyModel {
    /// Key id.
    pub id: StringValue,
    /// Label.
    pub label: StringValue,
    /// Access key id.
    pub access_key: StringValue,
    /// Secret key; only available from the create response.
    pub secret_key: StringValue,
    /// Whether the key is restricted to `bucket_access`.
    pub limited: BoolValue,
    /// Bucket grants.
    pub bucket_access: ListValue<BucketAccessModel>,
}

impl ObjectStorageKeyModel {
    fn declared_access(&self) -> Result<Option<Vec<BucketAccess>>> {
        if !self.bucket_access.is_known() {
            return Ok(None);
        }
        let grants = converted(self.bucket_access.elements_as(&AttributePath::root("bucket_access")))?;
        Ok(Some(grants.iter().map(BucketAccessModel::to_api).collect()))
    }

    /// Merges an API key into the model. An empty secret never replaces
    /// the stored one.
    pub fn flatten(&mut self, key: &ObjectStorageKey, preserve_known: bool) {
        merge(&mut self.id, Value::known(key.id.to_string()), preserve_known);
        merge(&mut self.label, Value::known(key.label.clone()), preserve_known);
        merge(&mut self.access_key, Value::known(key.access_key.clone()), preserve_known);
        if !key.secret_key.is_empty() {
            self.secret_key = Value::known(key.secret_key.clone());
        } else if self.secret_key.is_unknown() {
            self.secret_key = Value::Null;
        }
        merge(&mut self.limited, Value::known(key.limited), preserve_known);

        let observed = key.bucket_access.as_deref().unwrap_or_default();
        let declared = self
            .bucket_access
            .as_known()
            .map(|list| list.0.iter().filter_map(Value::as_known).collect::<Vec<_>>())
            .unwrap_or_default();
        let unchanged = declared.len() == observed.len()
            && declared.iter().all(|grant| observed.iter().any(|access| grant.grants(access)));
        if unchanged && self.bucket_access.is_known() {
            return;
        }
        self.bucket_access = if observed.is_empty() {
            Value::Null
        } else {
            Value::Known(List(
                observed
                    .iter()
                    .map(|access| Value::Known(BucketAccessModel::from_api(access)))
                    .collect(),
            ))
        };
    }
}

fn schema() -> ResourceSchema {
    let grant = AttributeType::object([
        ("bucket_name", AttributeType::String),
        ("region", AttributeType::String),
        ("cluster", AttributeType::String),
        ("permissions", AttributeType::String),
    ]);
    ResourceSchema::new("Manages a Linode Object Storage Key.")
        .with_attribute("id", AttributeSchema::id(AttributeType::String))
        .with_attribute(
            "label",
            AttributeSchema::required_string()
                .with_validator(Validator::LengthBetween(1, 50))
                .with_description("The label given to this key. For display purposes only."),
        )
        .with_attribute(
            "access_key",
            AttributeSchema::computed_string()
                .use_state_for_unknown()
                .with_description("This keypair's access key. This is not secret."),
        )
        .with_attribute(
            "secret_key",
            AttributeSchema::computed_string()
                .sensitive()
                .use_state_for_unknown()
                .with_description("This keypair's secret key."),
        )
        .with_attribute(
            "limited",
            AttributeSchema::new(AttributeType::Bool, Presence::Computed).use_state_for_unknown(),
        )
        .with_attribute(
            "bucket_access",
            AttributeSchema::new(AttributeType::list(grant), Presence::Optional)
                .force_replace()
                .with_description("A list of permissions to grant this limited access key."),
        )
}

/// Handler for `linode_object_storage_key`.
#[derive(Debug)]
pub struct ObjectStorageKeyResource {
    schema: ResourceSchema,
}

impl ObjectStorageKeyResource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for ObjectStorageKeyResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for ObjectStorageKeyResource {
    fn name(&self) -> &'static str {
        "linode_object_storage_key"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn modify_plan(&self, planned: &mut Json, _prior: Option<&Json>, _diags: &mut Diagnostics) {
        let Some(slot) = planned.get_mut("bucket_access") else {
            return;
        };
        // Absent grant fields plan as explicit nulls, matching stored state.
        if let Ok(grants @ Value::Known(_)) = ListValue::<BucketAccessModel>::from_json(slot.clone()) {
            if let Ok(normalized) = serde_json::to_value(grants) {
                *slot = normalized;
            }
        }
    }

    async fn create(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: CreateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut model: ObjectStorageKeyModel = decode_model(&req.planned)?;
        let opts = ObjectStorageKeyCreateOptions {
            label: model.label.as_str().to_string(),
            bucket_access: model.declared_access()?,
        };
        let key = meta.client.create_object_storage_key(ctx, &opts).await?;
        info!("Created object storage key {} ({})", key.label, key.id);

        model.id = meta.settle_id(model.id, key.id.to_string());
        model.flatten(&key, true);
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
        let mut model: ObjectStorageKeyModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        match meta.client.get_object_storage_key(ctx, id).await {
            Ok(key) => {
                model.flatten(&key, false);
                resp.state = Some(encode_model(&model)?);
                Ok(())
            }
            Err(err) => read_not_found(err, resp, "Object Storage Key", id),
        }
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let prior: ObjectStorageKeyModel = decode_model(&req.prior)?;
        let mut plan: ObjectStorageKeyModel = decode_model(&req.planned)?;
        let id = parse_id(&prior.id)?;
        plan.id = plan.id.fill_unknown(prior.id.clone());
        plan.secret_key = plan.secret_key.fill_unknown(prior.secret_key.clone());

        if plan.label != prior.label {
            let opts = ObjectStorageKeyUpdateOptions {
                label: plan.label.as_known().cloned(),
            };
            let key = meta.client.update_object_storage_key(ctx, id, &opts).await?;
            plan.flatten(&key, true);
        }

        let mut state = encode_model(&plan)?;
        meta.carry_over_prior(&mut state, &req.prior);
        resp.state = Some(state);
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: DeleteRequest,
        _resp: &mut ResourceResponse,
    ) -> Result<()> {
        let model: ObjectStorageKeyModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        ignore_not_found(meta.client.delete_object_storage_key(ctx, id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{PlanAction, Planner, ResourcePlan};
    use crate::linode::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_key(secret: &str, label: &str) -> Json {
        json!({
            "id": 55, "label": label, "access_key": "AKEXAMPLE", "secret_key": secret,
            "limited": true,
            "bucket_access": [{"bucket_name": "assets", "region": "us-east", "cluster": "us-east-1",
                               "permissions": "read_only"}],
        })
    }

    fn config(label: &str) -> Json {
        json!({
            "label": label,
            "bucket_access": [{"bucket_name": "assets", "region": "us-east", "permissions": "read_only"}],
        })
    }

    fn meta(server: &MockServer) -> ProviderMeta {
        ProviderMeta::new(test_config(server)).expect("meta")
    }

    fn plan(prior: Option<&Json>, config: &Json) -> ResourcePlan {
        let resource = ObjectStorageKeyResource::new();
        Planner::new(resource.schema()).plan_with(prior, config, |planned, prior, diags| {
            resource.modify_plan(planned, prior, diags);
        })
    }

    async fn created_state(server: &MockServer) -> Json {
        Mock::given(method("POST"))
            .and(path("/v4/object-storage/keys"))
            .and(body_partial_json(json!({"label": "ci"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_key("SECRETVALUE", "ci")))
            .expect(1)
            .mount(server)
            .await;

        let resource = ObjectStorageKeyResource::new();
        let plan = plan(None, &config("ci"));
        let mut resp = ResourceResponse::default();
        resource
            .create(
                &OpContext::background(),
                &meta(server),
                CreateRequest {
                    planned: plan.planned_state,
                    config: config("ci"),
                },
                &mut resp,
            )
            .await
            .expect("create");
        resp.state.expect("state")
    }

    #[tokio::test]
    async fn test_create_keeps_secret_and_declared_grants() {
        let server = MockServer::start().await;
        let state = created_state(&server).await;
        assert_eq!(state["id"], "55");
        assert_eq!(state["secret_key"], "SECRETVALUE");
        assert_eq!(state["bucket_access"][0]["region"], "us-east");
        assert!(state["bucket_access"][0]["cluster"].is_null());

        assert_eq!(plan(Some(&state), &config("ci")).action, PlanAction::NoChange);
    }

    #[tokio::test]
    async fn test_read_preserves_secret() {
        let server = MockServer::start().await;
        let state = created_state(&server).await;
        Mock::given(method("GET"))
            .and(path("/v4/object-storage/keys/55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_key("", "ci")))
            .mount(&server)
            .await;

        let mut resp = ResourceResponse::with_state(state.clone());
        ObjectStorageKeyResource::new()
            .read(&OpContext::background(), &meta(&server), ReadRequest { state }, &mut resp)
            .await
            .expect("read");
        assert_eq!(resp.state.expect("state")["secret_key"], "SECRETVALUE");
    }

    #[tokio::test]
    async fn test_label_change_updates_in_place() {
        let server = MockServer::start().await;
        let prior = created_state(&server).await;
        Mock::given(method("PUT"))
            .and(path("/v4/object-storage/keys/55"))
            .and(body_json(json!({"label": "deploy"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_key("", "deploy")))
            .expect(1)
            .mount(&server)
            .await;

        let resource = ObjectStorageKeyResource::new();
        let plan = plan(Some(&prior), &config("deploy"));
        assert_eq!(plan.action, PlanAction::Update);

        let mut resp = ResourceResponse::default();
        resource
            .update(
                &OpContext::background(),
                &meta(&server),
                UpdateRequest {
                    prior,
                    planned: plan.planned_state,
                    config: config("deploy"),
                },
                &mut resp,
            )
            .await
            .expect("update");
        let state = resp.state.expect("state");
        assert_eq!(state["label"], "deploy");
        assert_eq!(state["secret_key"], "SECRETVALUE");
    }

    #[tokio::test]
    async fn test_grant_change_replaces() {
        let server = MockServer::start().await;
        let prior = created_state(&server).await;
        let mut changed = config("ci");
        changed["bucket_access"][0]["permissions"] = json!("read_write");
        assert_eq!(plan(Some(&prior), &changed).action, PlanAction::Replace);
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v4/object-storage/keys/55"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": [{"reason": "Not found"}]})))
            .expect(1)
            .mount(&server)
            .await;

        ObjectStorageKeyResource::new()
            .delete(
                &OpContext::background(),
                &meta(&server),
                DeleteRequest {
                    state: json!({"id": "55", "label": "ci"}),
                },
                &mut ResourceResponse::default(),
            )
            .await
            .expect("delete");
    }
}
