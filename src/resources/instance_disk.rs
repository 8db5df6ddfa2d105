//! `linode_instance_disk`: a disk attached to a compute instance.
//!
//! Deleting or resizing a disk requires the instance to be powered off. The
//! handler shuts a booted instance down, performs the change and boots it
//! back into the config it was running, unless implicit reboots are
//! disabled, in which case the operation is refused.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::framework::{
    AttributePath, AttributeSchema, AttributeType, Diagnostics, Int64Value, MapValue, Presence,
    ResourceSchema, SetValue, StringValue, Validator, Value,
};
use crate::linode::{
    DiskStatus, EntityType, EventAction, EventPoller, InstanceDisk, InstanceDiskCreateOptions,
    InstanceDiskUpdateOptions,
};
use crate::provider::{
    CreateRequest, DeleteRequest, OpContext, ProviderMeta, ReadRequest, Resource,
    ResourceResponse, Timeouts, UpdateRequest, decode_model, encode_model,
};

use super::helpers::{converted, merge, parse_id, read_not_found, string_or_null, strings};
use super::instance::{
    boot_instance_sync, current_booted_config, ensure_reboot_allowed, random_root_pass,
    shutdown_instance_sync,
};

/// State of a `linode_instance_disk`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceDiskModel {
    /// Disk id.
    pub id: StringValue,
    /// Owning instance.
    pub linode_id: Int64Value,
    /// Label.
    pub label: StringValue,
    /// Size in MB.
    pub size: Int64Value,
    /// `raw`, `swap`, `ext3`, `ext4` or `initrd`.
    pub filesystem: StringValue,
    /// Image deployed to the disk.
    pub image: StringValue,
    /// Root password for image deployments.
    pub root_pass: StringValue,
    /// SSH keys installed for root.
    pub authorized_keys: SetValue<String>,
    /// Users whose SSH keys are installed for root.
    pub authorized_users: SetValue<String>,
    /// StackScript run on deployment.
    pub stackscript_id: Int64Value,
    /// StackScript UDF answers.
    pub stackscript_data: MapValue<String>,
    /// Creation timestamp.
    pub created: StringValue,
    /// Last update timestamp.
    pub updated: StringValue,
    /// `ready`, `not ready` or `deleting`.
    pub status: StringValue,
    /// Encryption state.
    pub disk_encryption: StringValue,
}

impl InstanceDiskModel {
    /// Merges an API disk into the model.
    pub fn flatten(&mut self, disk: &InstanceDisk, preserve_known: bool) {
        merge(&mut self.id, Value::known(disk.id.to_string()), preserve_known);
        merge(&mut self.label, Value::known(disk.label.clone()), preserve_known);
        merge(&mut self.size, Value::known(disk.size), preserve_known);
        merge(&mut self.filesystem, string_or_null(&disk.filesystem), preserve_known);
        merge(&mut self.created, Value::from_option(disk.created.clone()), preserve_known);
        merge(&mut self.updated, Value::from_option(disk.updated.clone()), preserve_known);
        merge(&mut self.status, Value::known(disk.status.to_string()), preserve_known);
        merge(
            &mut self.disk_encryption,
            Value::from_option(disk.disk_encryption.clone()),
            preserve_known,
        );
    }

    fn linode_id(&self) -> Result<i64> {
        self.linode_id
            .as_known()
            .copied()
            .ok_or_else(|| ConfigError::validation("linode_id must be known", "linode_id").into())
    }

    fn create_options(&self) -> Result<InstanceDiskCreateOptions> {
        let stackscript_data =
            converted(self.stackscript_data.elements_as(&AttributePath::root("stackscript_data")))?;
        Ok(InstanceDiskCreateOptions {
            label: self.label.as_str().to_string(),
            size: self.size.value_or_zero(),
            filesystem: self.filesystem.as_known().cloned(),
            image: self.image.as_known().cloned(),
            root_pass: self.root_pass.as_known().cloned(),
            authorized_keys: strings(&self.authorized_keys, "authorized_keys")?,
            authorized_users: strings(&self.authorized_users, "authorized_users")?,
            stackscript_id: self.stackscript_id.as_known().copied(),
            stackscript_data: (!stackscript_data.is_empty()).then_some(stackscript_data),
        })
    }
}

fn schema() -> ResourceSchema {
    let replace_set = || {
        AttributeSchema::new(AttributeType::set(AttributeType::String), Presence::Optional)
            .force_replace()
    };
    ResourceSchema::new("Manages a disk of a Linode instance.")
        .with_attribute("id", AttributeSchema::id(AttributeType::String))
        .with_attribute(
            "linode_id",
            AttributeSchema::required_int64()
                .force_replace()
                .with_description("The ID of the Linode to create this Disk under."),
        )
        .with_attribute("label", AttributeSchema::required_string())
        .with_attribute(
            "size",
            AttributeSchema::required_int64()
                .with_validator(Validator::IntAtLeast(1))
                .with_description("The size of the Disk in MB. Changing it resizes the Disk."),
        )
        .with_attribute(
            "filesystem",
            AttributeSchema::optional_string()
                .computed()
                .force_replace()
                .use_state_for_unknown()
                .with_validator(Validator::one_of(&["raw", "swap", "ext3", "ext4", "initrd"])),
        )
        .with_attribute("image", AttributeSchema::optional_string().force_replace())
        .with_attribute(
            "root_pass",
            AttributeSchema::optional_string()
                .sensitive()
                .force_replace()
                .with_validator(Validator::LengthBetween(7, 128))
                .with_description(
                    "The root user's password on the new Disk when deploying from an Image. \
                     A random password is used when unset.",
                ),
        )
        .with_attribute("authorized_keys", replace_set())
        .with_attribute("authorized_users", replace_set())
        .with_attribute(
            "stackscript_id",
            AttributeSchema::optional_int64().force_replace(),
        )
        .with_attribute(
            "stackscript_data",
            AttributeSchema::new(AttributeType::map(AttributeType::String), Presence::Optional)
                .sensitive()
                .force_replace(),
        )
        .with_attribute("created", AttributeSchema::computed_string().use_state_for_unknown())
        .with_attribute("updated", AttributeSchema::computed_string())
        .with_attribute("status", AttributeSchema::computed_string())
        .with_attribute("disk_encryption", AttributeSchema::computed_string())
}

/// Handler for `linode_instance_disk`.
#[derive(Debug)]
pub struct InstanceDiskResource {
    schema: ResourceSchema,
}

impl InstanceDiskResource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }

    async fn resize(
        ctx: &OpContext,
        meta: &ProviderMeta,
        linode_id: i64,
        disk_id: i64,
        size: i64,
        timeout: Duration,
    ) -> Result<()> {
        let booted = current_booted_config(ctx, meta, linode_id).await?;
        if booted.is_some() {
            ensure_reboot_allowed(meta, linode_id, "resize a disk")?;
            shutdown_instance_sync(ctx, meta, linode_id, timeout).await?;
        }

        let interval = meta.config.event_poll_interval();
        let poller = EventPoller::new(
            &meta.client,
            ctx,
            EntityType::Linode,
            linode_id,
            EventAction::DiskResize,
            interval,
        )
        .await?;
        meta.client
            .resize_instance_disk(ctx, linode_id, disk_id, size)
            .await?;
        poller.wait_for_finished(ctx, timeout).await?;
        meta.client
            .wait_for_disk_status(ctx, linode_id, disk_id, DiskStatus::Ready, interval, timeout)
            .await?;
        info!("Resized disk {} to {} MB", disk_id, size);

        if let Some(config_id) = booted {
            boot_instance_sync(ctx, meta, linode_id, Some(config_id), timeout).await?;
        }
        Ok(())
    }
}

impl Default for InstanceDiskResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for InstanceDiskResource {
    fn name(&self) -> &'static str {
        "linode_instance_disk"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::INSTANCE_DISK
    }

    fn validate_config(&self, config: &Json, diags: &mut Diagnostics) {
        let is_set = |name: &str| config.get(name).is_some_and(|v| !v.is_null());
        if is_set("image") {
            return;
        }
        for name in ["authorized_keys", "authorized_users", "stackscript_id", "stackscript_data"] {
            if is_set(name) {
                diags.add_attribute_error(
                    AttributePath::root(name),
                    "Invalid Attribute Combination",
                    format!("{name} can only be set together with image"),
                );
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
        let mut model: InstanceDiskModel = decode_model(&req.planned)?;
        let linode_id = model.linode_id()?;
        let ctx = ctx.with_entity("linode", linode_id);
        let timeout = self.timeouts().create;

        let mut opts = model.create_options()?;
        if opts.root_pass.is_none() && opts.image.is_some() {
            debug!("No root_pass declared; generating one");
            opts.root_pass = Some(random_root_pass());
        }

        let interval = meta.config.event_poll_interval();
        let poller = EventPoller::new(
            &meta.client,
            &ctx,
            EntityType::Linode,
            linode_id,
            EventAction::DiskCreate,
            interval,
        )
        .await?;
        let disk = meta.client.create_instance_disk(&ctx, linode_id, &opts).await?;
        info!("Created disk {} on instance {}; waiting for it to be ready", disk.id, linode_id);

        model.id = meta.settle_id(model.id, disk.id.to_string());
        resp.state = Some(encode_model(&model)?);

        let event = poller.wait_for_finished(&ctx, timeout).await?;
        let disk = meta
            .client
            .wait_for_disk_status(&ctx, linode_id, disk.id, DiskStatus::Ready, interval, timeout)
            .await?;
        debug!("Disk {} is ready (event {})", disk.id, event.id);

        model.flatten(&disk, true);
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
        let mut model: InstanceDiskModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        let linode_id = model.linode_id()?;
        match meta.client.get_instance_disk(ctx, linode_id, id).await {
            Ok(disk) => {
                model.flatten(&disk, false);
                resp.state = Some(encode_model(&model)?);
                Ok(())
            }
            Err(err) => read_not_found(err, resp, "Instance Disk", id),
        }
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let prior: InstanceDiskModel = decode_model(&req.prior)?;
        let mut plan: InstanceDiskModel = decode_model(&req.planned)?;
        let id = parse_id(&prior.id)?;
        let linode_id = prior.linode_id()?;
        let ctx = ctx.with_entity("linode", linode_id);

        if let Some(size) = plan.size.as_known().copied().filter(|_| plan.size != prior.size) {
            Self::resize(&ctx, meta, linode_id, id, size, self.timeouts().update).await?;
        }

        if plan.label.is_known() && plan.label != prior.label {
            let opts = InstanceDiskUpdateOptions {
                label: plan.label.as_known().cloned(),
            };
            meta.client.update_instance_disk(&ctx, linode_id, id, &opts).await?;
        }

        let disk = meta.client.get_instance_disk(&ctx, linode_id, id).await?;
        plan.id = plan.id.fill_unknown(prior.id);
        plan.flatten(&disk, true);
        resp.state = Some(encode_model(&plan)?);
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: DeleteRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let model: InstanceDiskModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        let linode_id = model.linode_id()?;
        let ctx = ctx.with_entity("linode", linode_id);
        let timeout = self.timeouts().delete;

        let booted = match current_booted_config(&ctx, meta, linode_id).await {
            Ok(booted) => booted,
            Err(err) => {
                warn!("Failed to get the booted config of instance {}: {}", linode_id, err);
                resp.diagnostics.add_warning(
                    format!("Failed to Get the Current Booted Config of Linode {linode_id}"),
                    format!("Will attempt to delete the disk without rebooting the instance. Error: {err}"),
                );
                None
            }
        };

        let disk_in_config = match booted {
            Some(config_id) => match meta.client.get_instance_config(&ctx, linode_id, config_id).await {
                Ok(config) => config.uses_disk(id),
                Err(err) => {
                    resp.diagnostics.add_warning(
                        format!("Failed to Check If Disk {id} Is Used by Config {config_id}"),
                        format!("Will attempt to delete the disk without rebooting the instance. Error: {err}"),
                    );
                    false
                }
            },
            None => false,
        };

        if booted.is_some() {
            ensure_reboot_allowed(meta, linode_id, "delete a disk")?;
            shutdown_instance_sync(&ctx, meta, linode_id, timeout).await?;
        }

        let poller = EventPoller::with_secondary(
            &meta.client,
            &ctx,
            EntityType::Linode,
            linode_id,
            id,
            EventAction::DiskDelete,
            meta.config.event_poll_interval(),
        )
        .await?;

        match meta.client.delete_instance_disk(&ctx, linode_id, id).await {
            Ok(()) => {
                poller.wait_for_finished(&ctx, timeout).await?;
                info!("Deleted disk {} of instance {}", id, linode_id);
            }
            Err(err) if err.is_not_found() => debug!("Disk {} was already gone", id),
            Err(err) => return Err(err),
        }

        if let Some(config_id) = booted.filter(|_| !disk_in_config) {
            boot_instance_sync(&ctx, meta, linode_id, Some(config_id), timeout).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::error::{ProviderError, ReconcileError};
    use crate::linode::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_json, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meta(config: ProviderConfig) -> ProviderMeta {
        ProviderMeta::new(config).expect("meta")
    }

    fn page(events: Vec<Json>) -> Json {
        json!({"data": events, "page": 1, "pages": 1, "results": events.len()})
    }

    fn api_disk(status: &str, size: i64, label: &str) -> Json {
        json!({
            "id": 55, "label": label, "size": size, "filesystem": "ext4", "status": status,
            "created": "2024-05-01T12:00:00", "updated": "2024-05-01T12:05:00",
            "disk_encryption": "disabled",
        })
    }

    async fn mount_instance(server: &MockServer, status: &str, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 100, "label": "web", "status": status,
            })));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    /// The first lookup for `action` sees no events; every later one sees
    /// the finished event.
    async fn mount_event(server: &MockServer, action: &str, event_id: i64, secondary: Option<i64>) {
        let pattern = format!("\"action\":\"{action}\"");
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .and(header_regex("X-Filter", &pattern))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(Vec::new())))
            .up_to_n_times(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .and(header_regex("X-Filter", &pattern))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![json!({
                "id": event_id, "action": action, "status": "finished",
                "entity": {"id": 100, "type": "linode"},
                "secondary_entity": secondary.map(|id| json!({"id": id, "type": "disk"})),
            })])))
            .mount(server)
            .await;
    }

    async fn mount_booted_config(server: &MockServer, config_id: i64) {
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .and(header_regex("X-Filter", "linode_reboot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![json!({
                "id": 1, "action": "linode_boot", "status": "finished",
                "entity": {"id": 100, "type": "linode"},
                "secondary_entity": {"id": config_id, "type": "linode_config"},
            })])))
            .mount(server)
            .await;
    }

    fn disk_state() -> Json {
        json!({"id": "55", "linode_id": 100, "label": "data", "size": 2048})
    }

    #[tokio::test]
    async fn test_create_waits_for_ready_disk() {
        let server = MockServer::start().await;
        mount_event(&server, "disk_create", 10, Some(55)).await;
        Mock::given(method("POST"))
            .and(path("/v4/linode/instances/100/disks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_disk("not ready", 2048, "data")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100/disks/55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_disk("ready", 2048, "data")))
            .mount(&server)
            .await;

        let resource = InstanceDiskResource::new();
        let config = json!({"linode_id": 100, "label": "data", "size": 2048, "image": "linode/debian12"});
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

        let state: InstanceDiskModel = decode_model(&resp.state.expect("state")).expect("model");
        assert_eq!(state.id, StringValue::from("55"));
        assert_eq!(state.status, StringValue::from("ready"));
        assert_eq!(state.filesystem, StringValue::from("ext4"));
        assert!(state.root_pass.is_null());

        let requests = server.received_requests().await.expect("recorded");
        let create = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .expect("create request");
        let body: Json = serde_json::from_slice(&create.body).expect("json body");
        assert_eq!(body["root_pass"].as_str().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn test_create_keeps_id_when_wait_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(Vec::new())))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![json!({
                "id": 11, "action": "disk_create", "status": "failed",
                "entity": {"id": 100, "type": "linode"},
            })])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/linode/instances/100/disks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_disk("not ready", 512, "swap")))
            .mount(&server)
            .await;

        let planned = json!({"linode_id": 100, "label": "swap", "size": 512, "filesystem": "swap"});
        let mut resp = ResourceResponse::default();
        let err = InstanceDiskResource::new()
            .create(
                &OpContext::background(),
                &meta(test_config(&server)),
                CreateRequest {
                    planned: planned.clone(),
                    config: planned,
                },
                &mut resp,
            )
            .await
            .expect_err("event failed");

        assert!(matches!(err, ProviderError::Api(_)));
        assert_eq!(resp.state.expect("persisted")["id"], "55");
    }

    #[tokio::test]
    async fn test_delete_power_cycles_booted_instance() {
        let server = MockServer::start().await;
        mount_instance(&server, "running", Some(1)).await;
        mount_instance(&server, "offline", Some(1)).await;
        mount_instance(&server, "running", None).await;
        mount_booted_config(&server, 77).await;
        mount_event(&server, "linode_shutdown", 20, None).await;
        mount_event(&server, "disk_delete", 21, Some(55)).await;
        mount_event(&server, "linode_boot", 22, Some(77)).await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100/configs/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 77, "label": "boot", "devices": {"sda": {"disk_id": 54}, "sdb": null},
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/linode/instances/100/shutdown"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v4/linode/instances/100/disks/55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/linode/instances/100/boot"))
            .and(body_json(json!({"config_id": 77})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut resp = ResourceResponse::default();
        InstanceDiskResource::new()
            .delete(
                &OpContext::background(),
                &meta(test_config(&server)),
                DeleteRequest { state: disk_state() },
                &mut resp,
            )
            .await
            .expect("delete");
        assert!(resp.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_delete_refuses_implicit_reboot() {
        let server = MockServer::start().await;
        mount_instance(&server, "running", None).await;
        mount_booted_config(&server, 77).await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100/configs/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77, "devices": {}})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v4/linode/instances/100/disks/55"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = ProviderConfig {
            skip_implicit_reboots: true,
            ..test_config(&server)
        };
        let err = InstanceDiskResource::new()
            .delete(
                &OpContext::background(),
                &meta(config),
                DeleteRequest { state: disk_state() },
                &mut ResourceResponse::default(),
            )
            .await
            .expect_err("refused");
        assert!(matches!(
            err,
            ProviderError::Reconcile(ReconcileError::RebootRequired { linode_id: 100, .. })
        ));
    }

    #[tokio::test]
    async fn test_update_resizes_offline_instance_disk() {
        let server = MockServer::start().await;
        mount_instance(&server, "offline", None).await;
        mount_event(&server, "disk_resize", 30, Some(55)).await;
        Mock::given(method("POST"))
            .and(path("/v4/linode/instances/100/disks/55/resize"))
            .and(body_json(json!({"size": 4096})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v4/linode/instances/100/disks/55"))
            .and(body_json(json!({"label": "bigger"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_disk("ready", 4096, "bigger")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100/disks/55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_disk("ready", 4096, "bigger")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/linode/instances/100/shutdown"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let prior = disk_state();
        let planned = json!({"id": "55", "linode_id": 100, "label": "bigger", "size": 4096});
        let mut resp = ResourceResponse::default();
        InstanceDiskResource::new()
            .update(
                &OpContext::background(),
                &meta(test_config(&server)),
                UpdateRequest {
                    prior,
                    planned: planned.clone(),
                    config: planned,
                },
                &mut resp,
            )
            .await
            .expect("update");

        let state = resp.state.expect("state");
        assert_eq!(state["size"], 4096);
        assert_eq!(state["label"], "bigger");
        assert_eq!(state["status"], "ready");
    }

    #[test]
    fn test_image_only_attributes() {
        let resource = InstanceDiskResource::new();
        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"linode_id": 1, "label": "d", "size": 10, "authorized_keys": ["ssh-ed25519 AAAA"]}),
            &mut diags,
        );
        assert!(diags.has_error());

        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"linode_id": 1, "label": "d", "size": 10, "image": "linode/alpine3.19",
                    "authorized_keys": ["ssh-ed25519 AAAA"]}),
            &mut diags,
        );
        assert!(!diags.has_error());
    }

    #[test]
    fn test_size_change_is_in_place() {
        let resource = InstanceDiskResource::new();
        let prior = json!({
            "id": "55", "linode_id": 100, "label": "data", "size": 2048, "filesystem": "ext4",
            "created": "2024-05-01T12:00:00", "status": "ready",
        });
        let config = json!({"linode_id": 100, "label": "data", "size": 4096});
        let plan = crate::framework::Planner::new(resource.schema()).plan(Some(&prior), &config);
        assert_eq!(plan.action, crate::framework::PlanAction::Update);

        let config = json!({"linode_id": 101, "label": "data", "size": 2048});
        let plan = crate::framework::Planner::new(resource.schema()).plan(Some(&prior), &config);
        assert_eq!(plan.action, crate::framework::PlanAction::Replace);
    }
}
