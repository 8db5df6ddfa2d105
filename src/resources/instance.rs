//! Instance power orchestration shared by resources that have to take an
//! instance down to change it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ReconcileError, Result};
use crate::linode::{EntityType, EventAction, EventPoller, Filter, InstanceStatus, Order};
use crate::provider::{OpContext, ProviderMeta};

/// Returns the config an instance is currently booted into.
///
/// The answer comes from the newest `linode_boot`/`linode_reboot` event, so
/// it is `None` for instances that are powered off or were never booted
/// with a config.
///
/// # Errors
///
/// Returns an error if the instance or the event log cannot be read.
pub async fn current_booted_config(
    ctx: &OpContext,
    meta: &ProviderMeta,
    linode_id: i64,
) -> Result<Option<i64>> {
    let instance = meta.client.get_instance(ctx, linode_id).await?;
    if !instance.status.is_booted() {
        debug!("Instance {} is {}; no booted config", linode_id, instance.status);
        return Ok(None);
    }

    let filter = Filter::new()
        .eq("entity.id", linode_id)
        .eq("entity.type", EntityType::Linode.as_str())
        .any_of(
            "action",
            [EventAction::LinodeBoot.as_str(), EventAction::LinodeReboot.as_str()],
        )
        .order_by("created", Order::Desc);

    let events = meta.client.list_recent_events(ctx, &filter).await?;
    Ok(events.first().and_then(|event| event.secondary_entity_id()))
}

/// Refuses an implicit power cycle when the provider forbids them.
///
/// # Errors
///
/// Returns [`ReconcileError::RebootRequired`] if `skip_implicit_reboots` is
/// set.
pub fn ensure_reboot_allowed(meta: &ProviderMeta, linode_id: i64, action: &str) -> Result<()> {
    if meta.config.skip_implicit_reboots {
        return Err(ReconcileError::RebootRequired {
            linode_id,
            action: action.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Shuts an instance down and waits until it is offline.
///
/// # Errors
///
/// Returns an error if the call fails, the event fails or `timeout` passes.
pub async fn shutdown_instance_sync(
    ctx: &OpContext,
    meta: &ProviderMeta,
    linode_id: i64,
    timeout: Duration,
) -> Result<()> {
    info!("Shutting down instance {}", linode_id);
    let interval = meta.config.event_poll_interval();
    let poller = EventPoller::new(
        &meta.client,
        ctx,
        EntityType::Linode,
        linode_id,
        EventAction::LinodeShutdown,
        interval,
    )
    .await?;

    meta.client.shutdown_instance(ctx, linode_id).await?;
    poller.wait_for_finished(ctx, timeout).await?;
    meta.client
        .wait_for_instance_status(ctx, linode_id, InstanceStatus::Offline, interval, timeout)
        .await?;
    debug!("Instance {} is offline", linode_id);
    Ok(())
}

/// Boots an instance into `config_id` and waits until it is running.
///
/// # Errors
///
/// Returns an error if the call fails, the event fails or `timeout` passes.
pub async fn boot_instance_sync(
    ctx: &OpContext,
    meta: &ProviderMeta,
    linode_id: i64,
    config_id: Option<i64>,
    timeout: Duration,
) -> Result<()> {
    info!("Booting instance {} into config {:?}", linode_id, config_id);
    let interval = meta.config.event_poll_interval();
    let poller = EventPoller::new(
        &meta.client,
        ctx,
        EntityType::Linode,
        linode_id,
        EventAction::LinodeBoot,
        interval,
    )
    .await?;

    meta.client.boot_instance(ctx, linode_id, config_id).await?;
    poller.wait_for_finished(ctx, timeout).await?;
    meta.client
        .wait_for_instance_status(ctx, linode_id, InstanceStatus::Running, interval, timeout)
        .await?;
    Ok(())
}

/// Generates a root password for image deployments that did not declare
/// one.
#[must_use]
pub fn random_root_pass() -> String {
    let mut bytes = Vec::with_capacity(48);
    for _ in 0..3 {
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    }
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::linode::test_config;
    use serde_json::json;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn instance(status: &str) -> serde_json::Value {
        json!({"id": 100, "label": "web", "status": status})
    }

    fn meta(config: ProviderConfig) -> ProviderMeta {
        ProviderMeta::new(config).expect("meta")
    }

    #[tokio::test]
    async fn test_offline_instance_has_no_booted_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance("offline")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let config = current_booted_config(&OpContext::background(), &meta(test_config(&server)), 100)
            .await
            .expect("config");
        assert_eq!(config, None);
    }

    #[tokio::test]
    async fn test_booted_config_from_latest_boot_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance("running")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .and(header_regex("X-Filter", "linode_reboot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": 9, "action": "linode_reboot", "status": "finished",
                     "entity": {"id": 100, "type": "linode"},
                     "secondary_entity": {"id": 55, "type": "linode_config"}},
                    {"id": 3, "action": "linode_boot", "status": "finished",
                     "entity": {"id": 100, "type": "linode"},
                     "secondary_entity": {"id": 54, "type": "linode_config"}},
                ],
                "page": 1, "pages": 1, "results": 2,
            })))
            .mount(&server)
            .await;

        let config = current_booted_config(&OpContext::background(), &meta(test_config(&server)), 100)
            .await
            .expect("config");
        assert_eq!(config, Some(55));
    }

    #[test]
    fn test_reboot_refused_when_skipped() {
        let config = ProviderConfig {
            token: Some(String::from("t")),
            skip_implicit_reboots: true,
            ..ProviderConfig::default()
        };
        let err = ensure_reboot_allowed(&meta(config), 7, "delete disk").expect_err("refused");
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_random_root_pass() {
        let a = random_root_pass();
        let b = random_root_pass();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
