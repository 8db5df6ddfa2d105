//! Node recycling and pool readiness waits.

use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::linode::{
    EntityType, EventAction, Filter, LkeNodePool, LkeNodeStatus, Order, poll_until,
};
use crate::provider::{OpContext, ProviderMeta};

/// Waits until no node of a pool reports `not_ready`.
///
/// # Errors
///
/// Returns an error if the pool cannot be read or `timeout` passes.
pub async fn wait_for_pool_ready(
    ctx: &OpContext,
    meta: &ProviderMeta,
    cluster_id: i64,
    pool_id: i64,
    timeout: Duration,
) -> Result<LkeNodePool> {
    let pool = poll_until(
        ctx,
        &format!("LKE cluster {cluster_id} pool {pool_id} to be ready"),
        meta.config.lke_node_ready_poll_interval(),
        timeout,
        |ctx| async move { meta.client.get_lke_node_pool(&ctx, cluster_id, pool_id).await },
        LkeNodePool::is_ready,
    )
    .await?;
    debug!("LKE cluster {} pool {} is ready", cluster_id, pool_id);
    Ok(pool)
}

/// Waits until at least one node of the cluster is ready.
///
/// # Errors
///
/// Returns an error if the pools cannot be listed or `timeout` passes.
pub async fn wait_for_ready_node(
    ctx: &OpContext,
    meta: &ProviderMeta,
    cluster_id: i64,
    timeout: Duration,
) -> Result<()> {
    poll_until(
        ctx,
        &format!("LKE cluster {cluster_id} to have a ready node"),
        meta.config.lke_node_ready_poll_interval(),
        timeout,
        |ctx| async move { meta.client.list_lke_node_pools(&ctx, cluster_id).await },
        |pools| {
            pools
                .iter()
                .flat_map(|pool| &pool.nodes)
                .any(|node| node.status == LkeNodeStatus::Ready)
        },
    )
    .await?;
    debug!("LKE cluster {} has a ready node", cluster_id);
    Ok(())
}

/// Id of the newest `linode_delete` event, or 0 when there is none.
async fn newest_delete_event(ctx: &OpContext, meta: &ProviderMeta) -> Result<i64> {
    let filter = Filter::new()
        .eq("entity.type", EntityType::Linode.as_str())
        .eq("action", EventAction::LinodeDelete.as_str())
        .order_by("id", Order::Desc);
    let events = meta.client.list_recent_events(ctx, &filter).await?;
    Ok(events.first().map_or(0, |event| event.id))
}

/// Recycles every node of a cluster.
///
/// Recycling replaces each node instance, so the call only returns once
/// every instance that existed before has been deleted and every pool
/// reports ready again.
///
/// # Errors
///
/// Returns an error if an API call fails or `timeout` passes.
pub async fn recycle_cluster(
    ctx: &OpContext,
    meta: &ProviderMeta,
    cluster_id: i64,
    pools: &[LkeNodePool],
    timeout: Duration,
) -> Result<()> {
    let ctx = ctx.with_timeout(timeout);
    let mut cursor = newest_delete_event(&ctx, meta).await?;

    let mut originals: HashMap<i64, i64> = pools
        .iter()
        .flat_map(|pool| {
            pool.nodes
                .iter()
                .filter_map(move |node| node.instance_id.map(|instance| (instance, pool.id)))
        })
        .collect();

    meta.client.recycle_lke_cluster(&ctx, cluster_id).await?;
    info!(
        "Recycling LKE cluster {} ({} nodes to replace)",
        cluster_id,
        originals.len()
    );

    let what = format!("original nodes of LKE cluster {cluster_id} to be deleted");
    let interval = meta.config.lke_event_poll_interval();
    while !originals.is_empty() {
        if ctx.is_expired() {
            return Err(ApiError::timeout(format!("{what} ({} remaining)", originals.len())).into());
        }

        let filter = Filter::new()
            .eq("entity.type", EntityType::Linode.as_str())
            .eq("action", EventAction::LinodeDelete.as_str())
            .gt("id", cursor)
            .order_by("id", Order::Asc);
        for event in meta.client.list_recent_events(&ctx, &filter).await? {
            cursor = cursor.max(event.id);
            let Some(instance) = event.entity_id() else {
                continue;
            };
            if let Some(pool_id) = originals.remove(&instance) {
                debug!(
                    "LKE cluster {} pool {} node {} was deleted",
                    cluster_id, pool_id, instance
                );
            }
        }

        if !originals.is_empty() {
            ctx.sleep(&what, interval).await?;
        }
    }

    for pool in pools {
        let remaining = ctx.remaining().unwrap_or(timeout);
        wait_for_pool_ready(&ctx, meta, cluster_id, pool.id, remaining).await?;
    }
    info!("Recycled LKE cluster {}", cluster_id);
    Ok(())
}
