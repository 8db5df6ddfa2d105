//! Event and status pollers.
//!
//! An [`EventPoller`] is created *before* the call that triggers an
//! asynchronous operation: it snapshots the ids of matching events that
//! already exist, so the event raised by the call is recognized as new.
//! [`poll_until`] covers operations that raise no event and are observed
//! through an entity's status instead.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ApiError, Result};
use crate::provider::OpContext;

use super::client::LinodeClient;
use super::filter::{Filter, Order};
use super::types::{DiskStatus, Event, EventStatus, Instance, InstanceDisk, InstanceStatus};

/// Entity types that appear in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    /// Compute instance.
    Linode,
    /// Kubernetes cluster.
    LkeCluster,
    /// DNS zone.
    Domain,
}

impl EntityType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linode => "linode",
            Self::LkeCluster => "lkecluster",
            Self::Domain => "domain",
        }
    }
}

/// Event actions the provider waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// `disk_create`
    DiskCreate,
    /// `disk_delete`
    DiskDelete,
    /// `disk_resize`
    DiskResize,
    /// `linode_boot`
    LinodeBoot,
    /// `linode_reboot`
    LinodeReboot,
    /// `linode_shutdown`
    LinodeShutdown,
    /// `linode_delete`
    LinodeDelete,
}

impl EventAction {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiskCreate => "disk_create",
            Self::DiskDelete => "disk_delete",
            Self::DiskResize => "disk_resize",
            Self::LinodeBoot => "linode_boot",
            Self::LinodeReboot => "linode_reboot",
            Self::LinodeShutdown => "linode_shutdown",
            Self::LinodeDelete => "linode_delete",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waits for the event raised by one asynchronous operation.
#[derive(Debug)]
pub struct EventPoller {
    client: LinodeClient,
    entity_type: EntityType,
    entity_id: i64,
    action: EventAction,
    secondary_id: Option<i64>,
    interval: Duration,
    previous: HashSet<i64>,
}

/// Poller progress.
#[derive(Debug, Clone, Copy)]
enum PollState {
    /// No new matching event seen yet.
    Searching,
    /// Following a specific event until it completes.
    Tracking(i64),
}

impl EventPoller {
    /// Creates a poller for `action` on an entity, snapshotting existing
    /// events.
    ///
    /// # Errors
    ///
    /// Returns an error if the event log cannot be read.
    pub async fn new(
        client: &LinodeClient,
        ctx: &OpContext,
        entity_type: EntityType,
        entity_id: i64,
        action: EventAction,
        interval: Duration,
    ) -> Result<Self> {
        Self::build(client, ctx, entity_type, entity_id, action, None, interval).await
    }

    /// Creates a poller that additionally requires the event's secondary
    /// entity to be `secondary_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the event log cannot be read.
    pub async fn with_secondary(
        client: &LinodeClient,
        ctx: &OpContext,
        entity_type: EntityType,
        entity_id: i64,
        secondary_id: i64,
        action: EventAction,
        interval: Duration,
    ) -> Result<Self> {
        Self::build(client, ctx, entity_type, entity_id, action, Some(secondary_id), interval).await
    }

    async fn build(
        client: &LinodeClient,
        ctx: &OpContext,
        entity_type: EntityType,
        entity_id: i64,
        action: EventAction,
        secondary_id: Option<i64>,
        interval: Duration,
    ) -> Result<Self> {
        let mut poller = Self {
            client: client.clone(),
            entity_type,
            entity_id,
            action,
            secondary_id,
            interval,
            previous: HashSet::new(),
        };

        poller.previous = client
            .list_recent_events(ctx, &poller.filter())
            .await?
            .into_iter()
            .map(|event| event.id)
            .collect();

        trace!(
            "Event poller for {action} on {} {entity_id} ignores {} existing events",
            entity_type.as_str(),
            poller.previous.len()
        );

        Ok(poller)
    }

    fn filter(&self) -> Filter {
        Filter::new()
            .eq("entity.id", self.entity_id)
            .eq("entity.type", self.entity_type.as_str())
            .eq("action", self.action.as_str())
            .order_by("created", Order::Desc)
    }

    fn is_new_match(&self, event: &Event) -> bool {
        !self.previous.contains(&event.id)
            && event.action == self.action.as_str()
            && self
                .secondary_id
                .is_none_or(|id| event.secondary_entity_id() == Some(id))
    }

    /// Polls until the awaited event finishes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EventFailed`] if the event failed and
    /// [`ApiError::Timeout`] once `timeout` or the context deadline passes.
    pub async fn wait_for_finished(&self, ctx: &OpContext, timeout: Duration) -> Result<Event> {
        let ctx = ctx.with_timeout(timeout);
        let what = format!("{} event on {} {}", self.action, self.entity_type.as_str(), self.entity_id);
        let mut state = PollState::Searching;

        loop {
            if ctx.is_expired() {
                return Err(ApiError::timeout(what).into());
            }

            let event = match state {
                PollState::Searching => {
                    let events = self.client.list_recent_events(&ctx, &self.filter()).await?;
                    events.into_iter().find(|event| self.is_new_match(event))
                }
                PollState::Tracking(id) => Some(self.client.get_event(&ctx, id).await?),
            };

            if let Some(event) = event {
                match event.status {
                    EventStatus::Finished => {
                        debug!("Event {} ({what}) finished", event.id);
                        return Ok(event);
                    }
                    EventStatus::Failed => {
                        return Err(ApiError::EventFailed {
                            event_id: event.id,
                            action: event.action,
                            entity_id: self.entity_id,
                        }
                        .into());
                    }
                    _ => {
                        trace!(
                            "Event {} ({what}) is {:?} at {}%",
                            event.id,
                            event.status,
                            event.percent_complete.unwrap_or_default()
                        );
                        state = PollState::Tracking(event.id);
                    }
                }
            }

            ctx.sleep(&what, self.interval).await?;
        }
    }
}

/// Polls `fetch` every `interval` until `done` accepts the result.
///
/// # Errors
///
/// Returns the first error from `fetch`, or [`ApiError::Timeout`] naming
/// `what` once `timeout` or the context deadline passes.
pub async fn poll_until<T, F, Fut, P>(
    ctx: &OpContext,
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut fetch: F,
    mut done: P,
) -> Result<T>
where
    F: FnMut(OpContext) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let ctx = ctx.with_timeout(timeout);

    loop {
        if ctx.is_expired() {
            return Err(ApiError::timeout(what).into());
        }

        let value = fetch(ctx.clone()).await?;
        if done(&value) {
            return Ok(value);
        }

        ctx.sleep(what, interval).await?;
    }
}

impl LinodeClient {
    /// Waits for an instance to reach `status`.
    ///
    /// # Errors
    ///
    /// Returns an error on API failure or timeout.
    pub async fn wait_for_instance_status(
        &self,
        ctx: &OpContext,
        linode_id: i64,
        status: InstanceStatus,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Instance> {
        poll_until(
            ctx,
            &format!("instance {linode_id} to be {status}"),
            interval,
            timeout,
            |ctx| async move { self.get_instance(&ctx, linode_id).await },
            |instance| instance.status == status,
        )
        .await
    }

    /// Waits for a disk to reach `status`.
    ///
    /// # Errors
    ///
    /// Returns an error on API failure or timeout.
    pub async fn wait_for_disk_status(
        &self,
        ctx: &OpContext,
        linode_id: i64,
        disk_id: i64,
        status: DiskStatus,
        interval: Duration,
        timeout: Duration,
    ) -> Result<InstanceDisk> {
        poll_until(
            ctx,
            &format!("disk {disk_id} to be {status}"),
            interval,
            timeout,
            |ctx| async move { self.get_instance_disk(&ctx, linode_id, disk_id).await },
            |disk| disk.status == status,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linode::client::tests::test_client;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(id: i64, status: &str, secondary: Option<i64>) -> serde_json::Value {
        json!({
            "id": id,
            "action": "disk_delete",
            "status": status,
            "created": "2024-05-01T12:00:00",
            "entity": {"id": 100, "type": "linode"},
            "secondary_entity": secondary.map(|id| json!({"id": id, "type": "disk"}))
        })
    }

    fn page(events: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"data": events, "page": 1, "pages": 1, "results": 0})
    }

    #[tokio::test]
    async fn test_waits_for_new_event_with_secondary() {
        let server = MockServer::start().await;

        // Snapshot: one old event.
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![event(1, "finished", Some(7))])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // After the trigger: the old event, a finished event for another
        // disk, and the awaited one still running.
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![
                event(3, "started", Some(7)),
                event(2, "finished", Some(8)),
                event(1, "finished", Some(7)),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(event(3, "finished", Some(7))))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let ctx = OpContext::background();
        let poller = EventPoller::with_secondary(
            &client,
            &ctx,
            EntityType::Linode,
            100,
            7,
            EventAction::DiskDelete,
            Duration::from_millis(5),
        )
        .await
        .expect("poller");

        let finished = poller
            .wait_for_finished(&ctx, Duration::from_secs(5))
            .await
            .expect("finished");
        assert_eq!(finished.id, 3);
    }

    #[tokio::test]
    async fn test_failed_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![event(4, "failed", Some(7))])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let ctx = OpContext::background();
        let poller = EventPoller::new(
            &client,
            &ctx,
            EntityType::Linode,
            100,
            EventAction::DiskDelete,
            Duration::from_millis(5),
        )
        .await
        .expect("poller");

        let err = poller
            .wait_for_finished(&ctx, Duration::from_secs(5))
            .await
            .expect_err("failed");
        assert!(matches!(
            err,
            crate::error::ProviderError::Api(ApiError::EventFailed { event_id: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_times_out_without_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/account/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let ctx = OpContext::background();
        let poller = EventPoller::new(
            &client,
            &ctx,
            EntityType::Linode,
            100,
            EventAction::DiskDelete,
            Duration::from_millis(5),
        )
        .await
        .expect("poller");

        let err = poller
            .wait_for_finished(&ctx, Duration::from_millis(40))
            .await
            .expect_err("timeout");
        assert!(matches!(err, crate::error::ProviderError::Api(ApiError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_poll_until_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5, "label": "web", "status": "shutting_down"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/linode/instances/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5, "label": "web", "status": "offline"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let instance = client
            .wait_for_instance_status(
                &OpContext::background(),
                5,
                InstanceStatus::Offline,
                Duration::from_millis(5),
                Duration::from_secs(5),
            )
            .await
            .expect("offline");
        assert_eq!(instance.status, InstanceStatus::Offline);
    }
}
