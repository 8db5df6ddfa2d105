//! `linode_object_storage_object`: one object in a bucket, written over the
//! S3 protocol.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::framework::{
    AttributePath, AttributeSchema, AttributeType, BoolValue, Diagnostics, Map, MapValue, Presence,
    ResourceSchema, StringValue, Validator, Value, is_unknown_marker, unknown_marker,
};
use crate::provider::{
    CreateRequest, DeleteRequest, OpContext, ProviderMeta, ReadRequest, Resource,
    ResourceResponse, UpdateRequest, decode_model, encode_model,
};

use super::credentials::{KeyRequest, Permission, with_object_keys};
use super::s3::{ObjectHead, ObjectStore, PutObject};
use crate::resources::helpers::{converted, merge};

/// Interval between uploads while a fresh key propagates.
const PUT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

const CANNED_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
    "custom",
];

/// State of a `linode_object_storage_object`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectModel {
    /// `{bucket}/{key}`.
    pub id: StringValue,
    /// Bucket label.
    pub bucket: StringValue,
    /// Object key.
    pub key: StringValue,
    /// Bucket region.
    pub region: StringValue,
    /// Legacy bucket cluster.
    pub cluster: StringValue,
    /// S3 access key.
    pub access_key: StringValue,
    /// S3 secret key.
    pub secret_key: StringValue,
    /// Literal UTF-8 content.
    pub content: StringValue,
    /// Base64-encoded binary content.
    pub content_base64: StringValue,
    /// Path of a local file to upload.
    pub source: StringValue,
    /// Hex SHA-256 of the content, computed at plan time.
    pub content_sha256: StringValue,
    /// Canned ACL.
    pub acl: StringValue,
    /// `Cache-Control`.
    pub cache_control: StringValue,
    /// `Content-Disposition`.
    pub content_disposition: StringValue,
    /// `Content-Encoding`.
    pub content_encoding: StringValue,
    /// `Content-Language`.
    pub content_language: StringValue,
    /// `Content-Type`.
    pub content_type: StringValue,
    /// Redirect target for website buckets.
    pub website_redirect: StringValue,
    /// User metadata.
    pub metadata: MapValue<String>,
    /// S3 endpoint hostname.
    pub endpoint: StringValue,
    /// Entity tag.
    pub etag: StringValue,
    /// Version id on versioned buckets.
    pub version_id: StringValue,
    /// Delete every version, bypassing governance retention.
    pub force_destroy: BoolValue,
}

fn known(value: &StringValue) -> Option<String> {
    value.as_known().cloned()
}

impl ObjectModel {
    fn bucket(&self) -> &str {
        self.bucket.as_str()
    }

    fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Region, or the legacy cluster when no region is set.
    #[must_use]
    pub fn region_or_cluster(&self) -> &str {
        self.region
            .as_known()
            .or_else(|| self.cluster.as_known())
            .map_or("", String::as_str)
    }

    fn key_request(&self, permission: Permission) -> KeyRequest<'_> {
        KeyRequest {
            access_key: self.access_key.as_known().map(String::as_str),
            secret_key: self.secret_key.as_known().map(String::as_str),
            bucket: self.bucket(),
            region_or_cluster: self.region_or_cluster(),
            permission,
        }
    }

    /// Reads the body from `content`, `content_base64` or `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base64 is malformed or the file unreadable.
    pub async fn body(&self) -> Result<Vec<u8>> {
        if let Some(content) = self.content.as_known() {
            return Ok(content.clone().into_bytes());
        }
        if let Some(encoded) = self.content_base64.as_known() {
            return STANDARD.decode(encoded).map_err(|e| {
                ConfigError::validation(format!("invalid base64 content: {e}"), "content_base64").into()
            });
        }
        if let Some(source) = self.source.as_known() {
            return Ok(tokio::fs::read(source).await?);
        }
        Ok(Vec::new())
    }

    /// Write parameters for the planned object.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be read or metadata is unknown.
    pub async fn put_request(&self) -> Result<PutObject> {
        let metadata = if self.metadata.is_known() {
            converted(self.metadata.elements_as(&AttributePath::root("metadata")))?
        } else {
            BTreeMap::new()
        };
        Ok(PutObject {
            body: self.body().await?,
            acl: known(&self.acl),
            cache_control: known(&self.cache_control),
            content_disposition: known(&self.content_disposition),
            content_encoding: known(&self.content_encoding),
            content_language: known(&self.content_language),
            content_type: known(&self.content_type),
            website_redirect: known(&self.website_redirect),
            metadata,
        })
    }

    /// True when the stored object must be rewritten to reach `self`.
    #[must_use]
    pub fn needs_put(&self, prior: &Self) -> bool {
        let changed = |planned: &StringValue, before: &StringValue| planned.is_known() && planned != before;
        self.content != prior.content
            || self.content_base64 != prior.content_base64
            || self.source != prior.source
            || changed(&self.content_sha256, &prior.content_sha256)
            || self.cache_control != prior.cache_control
            || self.content_disposition != prior.content_disposition
            || self.content_encoding != prior.content_encoding
            || self.content_language != prior.content_language
            || changed(&self.content_type, &prior.content_type)
            || self.website_redirect != prior.website_redirect
            || self.metadata != prior.metadata
    }

    /// Merges object headers into the model.
    pub fn flatten(&mut self, head: &ObjectHead, preserve_known: bool) {
        let id = format!("{}/{}", self.bucket(), self.key());
        merge(&mut self.id, Value::known(id), preserve_known);
        merge(&mut self.etag, Value::from_option(head.etag.clone()), false);
        merge(&mut self.version_id, Value::from_option(head.version_id.clone()), false);
        merge(&mut self.cache_control, Value::from_option(head.cache_control.clone()), preserve_known);
        merge(
            &mut self.content_disposition,
            Value::from_option(head.content_disposition.clone()),
            preserve_known,
        );
        merge(
            &mut self.content_encoding,
            Value::from_option(head.content_encoding.clone()),
            preserve_known,
        );
        merge(
            &mut self.content_language,
            Value::from_option(head.content_language.clone()),
            preserve_known,
        );
        merge(&mut self.content_type, Value::from_option(head.content_type.clone()), preserve_known);
        merge(
            &mut self.website_redirect,
            Value::from_option(head.website_redirect.clone()),
            preserve_known,
        );

        let metadata = if head.metadata.is_empty() && !self.metadata.as_known().is_some_and(|m| m.0.is_empty()) {
            Value::Null
        } else {
            Value::Known(Map(head
                .metadata
                .iter()
                .map(|(k, v)| (k.to_lowercase(), Value::known(v.clone())))
                .collect()))
        };
        merge(&mut self.metadata, metadata, preserve_known);
        if self.force_destroy.is_unknown() {
            self.force_destroy = Value::known(false);
        }
    }
}

/// Hex SHA-256 of the configured content. `Ok(None)` when a content
/// attribute is still unknown.
fn content_digest(planned: &Json) -> std::result::Result<Option<String>, (&'static str, String)> {
    let field = |name: &str| planned.get(name).filter(|v| !v.is_null());
    if ["content", "content_base64", "source"]
        .iter()
        .any(|name| field(name).is_some_and(is_unknown_marker))
    {
        return Ok(None);
    }

    let bytes = if let Some(content) = field("content").and_then(Json::as_str) {
        content.as_bytes().to_vec()
    } else if let Some(encoded) = field("content_base64").and_then(Json::as_str) {
        STANDARD
            .decode(encoded)
            .map_err(|e| ("content_base64", format!("invalid base64 content: {e}")))?
    } else if let Some(source) = field("source").and_then(Json::as_str) {
        std::fs::read(source).map_err(|e| ("source", format!("cannot read {source}: {e}")))?
    } else {
        Vec::new()
    };
    Ok(Some(hex::encode(Sha256::digest(&bytes))))
}

/// Endpoint host for the bucket: the configured one, the bucket hostname
/// without its `{label}.` prefix, or the regional default.
async fn resolve_endpoint(ctx: &OpContext, meta: &ProviderMeta, model: &ObjectModel) -> String {
    if let Some(endpoint) = model.endpoint.as_known().filter(|e| !e.is_empty()) {
        return endpoint.clone();
    }
    let region_or_cluster = model.region_or_cluster();
    let fallback = format!("{region_or_cluster}.linodeobjects.com");
    match meta
        .client
        .get_object_storage_bucket(ctx, region_or_cluster, model.bucket())
        .await
    {
        Ok(bucket) if !bucket.hostname.is_empty() => {
            let prefix = format!("{}.", bucket.label);
            bucket
                .hostname
                .strip_prefix(&prefix)
                .unwrap_or(&bucket.hostname)
                .to_string()
        }
        Ok(_) => fallback,
        Err(e) => {
            debug!("Bucket lookup for {} failed, using {}: {}", model.bucket(), fallback, e);
            fallback
        }
    }
}

/// Uploads `object`, retrying refused requests while minted keys propagate.
async fn put_with_retries(
    ctx: &OpContext,
    store: &ObjectStore,
    model: &ObjectModel,
    object: &PutObject,
    temporary: bool,
) -> Result<()> {
    loop {
        match store.put(model.bucket(), model.key(), object).await {
            Ok(()) => return Ok(()),
            Err(failure) if temporary && failure.is_access_denied() && !ctx.is_expired() => {
                debug!("Upload refused while the key propagates, retrying: {}", failure);
                ctx.sleep("object upload to be accepted", PUT_RETRY_INTERVAL).await?;
            }
            Err(failure) => return Err(failure.into()),
        }
    }
}

fn schema() -> ResourceSchema {
    let header = |description: &str| AttributeSchema::optional_string().with_description(description);
    ResourceSchema::new("Manages a Linode Object Storage Object.")
        .with_attribute("id", AttributeSchema::id(AttributeType::String))
        .with_attribute(
            "bucket",
            AttributeSchema::required_string()
                .force_replace()
                .with_description("The target bucket to put this object in."),
        )
        .with_attribute(
            "key",
            AttributeSchema::required_string()
                .force_replace()
                .with_description("The name of the object once it is in the bucket."),
        )
        .with_attribute(
            "region",
            AttributeSchema::optional_string()
                .force_replace()
                .with_description("The region of the bucket."),
        )
        .with_attribute(
            "cluster",
            AttributeSchema::optional_string()
                .force_replace()
                .with_description("The cluster of the bucket. Deprecated in favor of `region`."),
        )
        .with_attribute("access_key", AttributeSchema::optional_string().sensitive())
        .with_attribute("secret_key", AttributeSchema::optional_string().sensitive())
        .with_attribute("content", header("Literal string value to use as the object content."))
        .with_attribute(
            "content_base64",
            header("Base64-encoded data that will be decoded and uploaded as raw bytes."),
        )
        .with_attribute("source", header("The path to a file that will be read and uploaded."))
        .with_attribute(
            "content_sha256",
            AttributeSchema::computed_string()
                .with_description("SHA-256 of the content, used to detect changes to `source`."),
        )
        .with_attribute(
            "acl",
            AttributeSchema::optional_string()
                .with_default("private")
                .with_validator(Validator::one_of(CANNED_ACLS)),
        )
        .with_attribute("cache_control", header("Caching behavior along the request/reply chain."))
        .with_attribute("content_disposition", header("Presentational information for the object."))
        .with_attribute("content_encoding", header("Content encodings applied to the object."))
        .with_attribute("content_language", header("The language the content is in."))
        .with_attribute(
            "content_type",
            header("A standard MIME type describing the format of the object data.").computed(),
        )
        .with_attribute("website_redirect", header("Redirect target for website buckets."))
        .with_attribute(
            "metadata",
            AttributeSchema::new(AttributeType::map(AttributeType::String), Presence::Optional)
                .with_description("Metadata stored with the object. Keys must be lowercase."),
        )
        .with_attribute(
            "endpoint",
            AttributeSchema::optional_string()
                .computed()
                .use_state_for_unknown()
                .with_description("The endpoint of the bucket."),
        )
        .with_attribute("etag", AttributeSchema::computed_string())
        .with_attribute("version_id", AttributeSchema::computed_string())
        .with_attribute(
            "force_destroy",
            AttributeSchema::optional_bool()
                .with_default(false)
                .with_description("Delete all versions of the object, bypassing governance retention."),
        )
}

/// Handler for `linode_object_storage_object`.
#[derive(Debug)]
pub struct ObjectStorageObjectResource {
    schema: ResourceSchema,
}

impl ObjectStorageObjectResource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }

    /// Writes the object, then reads back its headers.
    async fn write(
        ctx: &OpContext,
        meta: &ProviderMeta,
        model: &ObjectModel,
        acl_only: bool,
    ) -> Result<Option<ObjectHead>> {
        let endpoint = resolve_endpoint(ctx, meta, model).await;
        let object = model.put_request().await?;
        with_object_keys(ctx, meta, &model.key_request(Permission::ReadWrite), |keys| async move {
            let store = ObjectStore::connect(&endpoint, &keys).await;
            if acl_only {
                let acl = object.acl.as_deref().unwrap_or("private");
                store.put_acl(model.bucket(), model.key(), acl).await?;
            } else {
                put_with_retries(ctx, &store, model, &object, keys.temporary).await?;
            }
            Ok(store.head(model.bucket(), model.key()).await?)
        })
        .await
    }
}

impl Default for ObjectStorageObjectResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for ObjectStorageObjectResource {
    fn name(&self) -> &'static str {
        "linode_object_storage_object"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn validate_config(&self, config: &Json, diags: &mut Diagnostics) {
        let is_set = |name: &str| config.get(name).is_some_and(|v| !v.is_null());

        let sources = ["content", "content_base64", "source"]
            .into_iter()
            .filter(|name| is_set(name))
            .count();
        if sources != 1 {
            diags.add_attribute_error(
                AttributePath::root("content"),
                "Invalid Attribute Combination",
                "exactly one of content, content_base64 or source must be specified",
            );
        }

        if is_set("region") == is_set("cluster") {
            diags.add_attribute_error(
                AttributePath::root("region"),
                "Invalid Attribute Combination",
                "exactly one of region or cluster must be specified",
            );
        } else if is_set("cluster") {
            diags.add_warning(
                "Deprecated Attribute",
                "cluster is deprecated; use region instead",
            );
        }

        if let Some(metadata) = config.get("metadata").and_then(Json::as_object) {
            for key in metadata.keys().filter(|k| k.to_lowercase() != **k) {
                diags.add_attribute_error(
                    AttributePath::root("metadata").attr(key.clone()),
                    "Invalid Metadata Key",
                    format!("metadata key {key:?} must be lowercase"),
                );
            }
        }
    }

    fn modify_plan(&self, planned: &mut Json, _prior: Option<&Json>, diags: &mut Diagnostics) {
        let digest = match content_digest(planned) {
            Ok(Some(digest)) => Json::String(digest),
            Ok(None) => unknown_marker(),
            Err((attribute, detail)) => {
                diags.add_attribute_error(AttributePath::root(attribute), "Unreadable Content", detail);
                return;
            }
        };
        if let Some(obj) = planned.as_object_mut() {
            obj.insert(String::from("content_sha256"), digest);
        }
    }

    async fn create(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: CreateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut model: ObjectModel = decode_model(&req.planned)?;
        model.endpoint = Value::known(resolve_endpoint(ctx, meta, &model).await);

        let head = Self::write(ctx, meta, &model, false).await?;
        info!("Put object {}/{}", model.bucket(), model.key());

        let created_id = format!("{}/{}", model.bucket(), model.key());
        model.id = meta.settle_id(model.id, created_id);
        match head {
            Some(head) => model.flatten(&head, true),
            None => warn!("Object {}/{} was not readable after upload", model.bucket(), model.key()),
        }
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
        let mut model: ObjectModel = decode_model(&req.state)?;
        let endpoint = resolve_endpoint(ctx, meta, &model).await;
        let (host, bucket, key) = (endpoint.as_str(), model.bucket(), model.key());

        let head = with_object_keys(ctx, meta, &model.key_request(Permission::ReadOnly), |keys| async move {
            let store = ObjectStore::connect(host, &keys).await;
            Ok(store.head(bucket, key).await?)
        })
        .await?;

        let Some(head) = head else {
            warn!("Removing object {} from state because it no longer exists", model.id.as_str());
            resp.diagnostics.add_warning(
                "Object no longer exists",
                format!("Removing object {} from state because it no longer exists", model.id.as_str()),
            );
            resp.remove();
            return Ok(());
        };

        model.endpoint = Value::known(endpoint);
        model.flatten(&head, false);
        resp.state = Some(encode_model(&model)?);
        Ok(())
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let prior: ObjectModel = decode_model(&req.prior)?;
        let mut plan: ObjectModel = decode_model(&req.planned)?;
        plan.id = plan.id.fill_unknown(prior.id.clone());
        plan.endpoint = plan.endpoint.fill_unknown(prior.endpoint.clone());

        let rewrite = plan.needs_put(&prior);
        let acl_changed = plan.acl != prior.acl;
        if !rewrite && !acl_changed {
            let mut state = encode_model(&plan)?;
            meta.carry_over_prior(&mut state, &req.prior);
            resp.state = Some(state);
            return Ok(());
        }

        if rewrite {
            debug!("Object {} content or headers changed", plan.id.as_str());
        }
        if let Some(head) = Self::write(ctx, meta, &plan, !rewrite).await? {
            plan.flatten(&head, true);
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
        let model: ObjectModel = decode_model(&req.state)?;
        let endpoint = resolve_endpoint(ctx, meta, &model).await;
        let force = model.force_destroy.as_known().copied().unwrap_or(false);
        let versioned = model.version_id.as_known().is_some_and(|v| !v.is_empty() && v != "null");

        let (bucket, key) = (model.bucket(), model.key());
        with_object_keys(ctx, meta, &model.key_request(Permission::ReadWrite), |keys| async move {
            let store = ObjectStore::connect(&endpoint, &keys).await;
            if versioned {
                store.delete_all_versions(bucket, key, force).await?;
            } else {
                store.delete(bucket, key, None, force).await?;
            }
            Ok(())
        })
        .await?;
        info!("Deleted object {}/{}", model.bucket(), model.key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::framework::{PlanAction, Planner, map_of};
    use crate::linode::test_config;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meta(server: &MockServer) -> ProviderMeta {
        ProviderMeta::new(ProviderConfig {
            obj_access_key: Some(String::from("AK")),
            obj_secret_key: Some(String::from("SK")),
            ..test_config(server)
        })
        .expect("meta")
    }

    fn plan(resource: &ObjectStorageObjectResource, prior: Option<&Json>, config: &Json) -> crate::framework::ResourcePlan {
        Planner::new(resource.schema()).plan_with(prior, config, |planned, prior, diags| {
            resource.modify_plan(planned, prior, diags);
        })
    }

    fn object_config(server: &MockServer, content: &str) -> Json {
        json!({
            "bucket": "assets", "key": "a.txt", "region": "us-east",
            "content": content, "content_type": "text/plain",
            "endpoint": server.uri(), "metadata": {"team": "infra"},
        })
    }

    async fn mount_head(server: &MockServer) {
        Mock::given(method("HEAD"))
            .and(path("/assets/a.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"etag-1\"")
                    .insert_header("Content-Type", "text/plain")
                    .insert_header("x-amz-meta-team", "infra"),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_digest_tracks_source_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let file = dir.path().join("index.html");
        std::fs::File::create(&file)
            .and_then(|mut f| f.write_all(b"hello"))
            .expect("write");

        let resource = ObjectStorageObjectResource::new();
        let config = json!({
            "bucket": "assets", "key": "index.html", "region": "us-east",
            "source": file.to_string_lossy(),
        });
        let first = plan(&resource, None, &config);
        assert_eq!(
            first.planned_state["content_sha256"],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let mut prior = first.planned_state.clone();
        prior["id"] = json!("assets/index.html");
        prior["etag"] = json!("e");
        prior["version_id"] = Json::Null;
        prior["content_type"] = json!("binary/octet-stream");
        prior["endpoint"] = json!("us-east-1.linodeobjects.com");
        assert_eq!(plan(&resource, Some(&prior), &config).action, PlanAction::NoChange);

        std::fs::write(&file, b"hello again").expect("rewrite");
        let changed = plan(&resource, Some(&prior), &config);
        assert_eq!(changed.action, PlanAction::Update);
        assert!(changed.changes.iter().any(|c| c.attribute == "content_sha256"));
    }

    #[test]
    fn test_validation() {
        let resource = ObjectStorageObjectResource::new();
        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"bucket": "b", "key": "k", "content": "x", "source": "/tmp/x", "region": "us-east", "cluster": "us-east-1"}),
            &mut diags,
        );
        assert_eq!(diags.errors().count(), 2);

        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"bucket": "b", "key": "k", "content": "x", "cluster": "us-east-1", "metadata": {"Team": "a"}}),
            &mut diags,
        );
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_create_puts_and_reads_back() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/assets/a.txt"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\""))
            .expect(1)
            .mount(&server)
            .await;
        mount_head(&server).await;

        let resource = ObjectStorageObjectResource::new();
        let config = object_config(&server, "hello");
        let planned = plan(&resource, None, &config);
        assert_eq!(planned.action, PlanAction::Create);

        let mut resp = ResourceResponse::default();
        resource
            .create(
                &OpContext::background(),
                &meta(&server),
                CreateRequest {
                    planned: planned.planned_state,
                    config,
                },
                &mut resp,
            )
            .await
            .expect("create");

        let state: ObjectModel = decode_model(&resp.state.expect("state")).expect("model");
        assert_eq!(state.id, StringValue::from("assets/a.txt"));
        assert_eq!(state.etag, StringValue::from("etag-1"));
        assert_eq!(state.acl, StringValue::from("private"));
        assert_eq!(state.metadata, map_of([(String::from("team"), String::from("infra"))]));
        assert!(state.version_id.is_null());
    }

    #[tokio::test]
    async fn test_acl_change_only_updates_acl() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/assets/a.txt"))
            .and(query_param("acl", ""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_head(&server).await;

        let resource = ObjectStorageObjectResource::new();
        let mut prior = plan(&resource, None, &object_config(&server, "hello")).planned_state;
        prior["id"] = json!("assets/a.txt");
        prior["etag"] = json!("etag-1");
        prior["version_id"] = Json::Null;

        let mut config = object_config(&server, "hello");
        config["acl"] = json!("public-read");
        let planned = plan(&resource, Some(&prior), &config);
        assert_eq!(planned.action, PlanAction::Update);

        let mut resp = ResourceResponse::default();
        resource
            .update(
                &OpContext::background(),
                &meta(&server),
                UpdateRequest {
                    prior,
                    planned: planned.planned_state,
                    config,
                },
                &mut resp,
            )
            .await
            .expect("update");
        assert_eq!(resp.state.expect("state")["acl"], "public-read");
    }

    #[tokio::test]
    async fn test_read_missing_object_is_removed() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/assets/a.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let state = json!({
            "id": "assets/a.txt", "bucket": "assets", "key": "a.txt",
            "region": "us-east", "endpoint": server.uri(),
        });
        let mut resp = ResourceResponse::with_state(state.clone());
        ObjectStorageObjectResource::new()
            .read(&OpContext::background(), &meta(&server), ReadRequest { state }, &mut resp)
            .await
            .expect("read");
        assert!(resp.state.is_none());
        assert_eq!(resp.diagnostics.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_endpoint_from_bucket_hostname() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/object-storage/buckets/us-mia/assets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": "assets", "region": "us-mia",
                "hostname": "assets.us-mia-1.linodeobjects.com",
            })))
            .mount(&server)
            .await;

        let model = ObjectModel {
            bucket: StringValue::from("assets"),
            key: StringValue::from("k"),
            region: StringValue::from("us-mia"),
            ..ObjectModel::default()
        };
        let endpoint = resolve_endpoint(&OpContext::background(), &meta(&server), &model).await;
        assert_eq!(endpoint, "us-mia-1.linodeobjects.com");
    }
}
