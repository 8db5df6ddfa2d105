//! `linode_lke_cluster`: a managed Kubernetes cluster and its node pools.
//!
//! Pools are declared as an ordered list but identified by server ids the
//! user never writes. Planning links each declared pool to the pool it
//! denotes in state; applying reconciles the declared pools against the
//! live ones.

mod model;
mod pools;
mod recycle;

use async_trait::async_trait;
use serde_json::Value as Json;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::framework::{AttributePath, AttributeSchema, AttributeType, Diagnostics, Presence, ResourceSchema};
use crate::linode::{LkeClusterUpdateOptions, poll_until};
use crate::provider::{
    CreateRequest, DeleteRequest, OpContext, ProviderMeta, ReadRequest, Resource,
    ResourceResponse, Timeouts, UpdateRequest, decode_model, encode_model,
};

use super::helpers::{ignore_not_found, parse_id, read_not_found, strings};

use model::{ClusterSnapshot, LkeClusterModel, link_planned_pools};
use pools::reconcile_pools;
use recycle::{recycle_cluster, wait_for_pool_ready, wait_for_ready_node};

/// Upper bound on the wait for the first ready node after creation.
const FIRST_NODE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

fn schema() -> ResourceSchema {
    let node = AttributeType::object([
        ("id", AttributeType::String),
        ("instance_id", AttributeType::Int64),
        ("status", AttributeType::String),
    ]);
    let pool = AttributeType::object([
        ("id", AttributeType::Int64),
        ("type", AttributeType::String),
        ("count", AttributeType::Int64),
        (
            "autoscaler",
            AttributeType::object([("min", AttributeType::Int64), ("max", AttributeType::Int64)]),
        ),
        ("nodes", AttributeType::list(node)),
        ("tags", AttributeType::set(AttributeType::String)),
    ]);

    ResourceSchema::new("Manages a Linode Kubernetes Engine cluster.")
        .with_attribute("id", AttributeSchema::id(AttributeType::String))
        .with_attribute(
            "label",
            AttributeSchema::required_string().with_description("The unique label for the cluster."),
        )
        .with_attribute(
            "region",
            AttributeSchema::required_string()
                .force_replace()
                .with_description("The region where the cluster will be deployed."),
        )
        .with_attribute(
            "k8s_version",
            AttributeSchema::required_string().with_description(
                "The desired Kubernetes version for this cluster. Upgrading recycles every node.",
            ),
        )
        .with_attribute(
            "tags",
            AttributeSchema::new(AttributeType::set(AttributeType::String), Presence::Optional),
        )
        .with_attribute("status", AttributeSchema::computed_string())
        .with_attribute(
            "kubeconfig",
            AttributeSchema::computed_string()
                .sensitive()
                .use_state_for_unknown()
                .with_description("The base64-encoded kubeconfig for the cluster."),
        )
        .with_attribute("dashboard_url", AttributeSchema::computed_string())
        .with_attribute(
            "api_endpoints",
            AttributeSchema::new(AttributeType::list(AttributeType::String), Presence::Computed),
        )
        .with_attribute(
            "control_plane",
            AttributeSchema::new(
                AttributeType::object([("high_availability", AttributeType::Bool)]),
                Presence::OptionalComputed,
            )
            .use_state_for_unknown(),
        )
        .with_attribute(
            "pool",
            AttributeSchema::new(AttributeType::list(pool), Presence::Required)
                .with_description("The node pools of the cluster. At least one is required."),
        )
}

async fn observe(ctx: &OpContext, meta: &ProviderMeta, cluster_id: i64) -> Result<ClusterSnapshot> {
    let cluster = meta.client.get_lke_cluster(ctx, cluster_id).await?;
    let pools = meta.client.list_lke_node_pools(ctx, cluster_id).await?;
    let kubeconfig = meta.client.get_lke_kubeconfig(ctx, cluster_id).await?.kubeconfig;
    let api_endpoints = meta
        .client
        .list_lke_api_endpoints(ctx, cluster_id)
        .await?
        .into_iter()
        .map(|e| e.endpoint)
        .collect();
    let dashboard_url = match meta.client.get_lke_dashboard(ctx, cluster_id).await {
        Ok(dashboard) => dashboard.url,
        Err(err) => {
            debug!("No dashboard for LKE cluster {}: {}", cluster_id, err);
            String::new()
        }
    };

    Ok(ClusterSnapshot {
        cluster,
        pools,
        kubeconfig,
        api_endpoints,
        dashboard_url,
    })
}

/// Handler for `linode_lke_cluster`.
#[derive(Debug)]
pub struct LkeClusterResource {
    schema: ResourceSchema,
}

impl LkeClusterResource {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for LkeClusterResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for LkeClusterResource {
    fn name(&self) -> &'static str {
        "linode_lke_cluster"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::LKE_CLUSTER
    }

    fn validate_config(&self, config: &Json, diags: &mut Diagnostics) {
        let pools = config.get("pool").and_then(Json::as_array);
        if pools.is_none_or(Vec::is_empty) {
            diags.add_attribute_error(
                AttributePath::root("pool"),
                "Missing Attribute",
                "at least one pool is required",
            );
            return;
        }

        for (i, pool) in pools.into_iter().flatten().enumerate() {
            let path = AttributePath::root("pool").index(i);
            let count = pool.get("count").filter(|v| !v.is_null());
            let autoscaler = pool.get("autoscaler").filter(|v| !v.is_null());

            if count.and_then(Json::as_i64).is_some_and(|c| c < 1) {
                diags.add_attribute_error(
                    path.clone().attr("count"),
                    "Invalid Attribute Value",
                    format!("pool.{i}: `count` must be at least 1"),
                );
            }
            if count.is_none() && autoscaler.is_none() {
                diags.add_attribute_error(
                    path.clone().attr("count"),
                    "Missing Attribute",
                    format!("pool.{i}: `count` must be defined when no autoscaler is defined"),
                );
            }
            if let Some(autoscaler) = autoscaler {
                let bound = |name: &str| autoscaler.get(name).and_then(Json::as_i64);
                if let (Some(min), Some(max)) = (bound("min"), bound("max")) {
                    if min < 1 || min > max {
                        diags.add_attribute_error(
                            path.attr("autoscaler"),
                            "Invalid Attribute Value",
                            format!("pool.{i}: autoscaler needs 1 <= min <= max, got min {min} and max {max}"),
                        );
                    }
                }
            }
        }
    }

    fn modify_plan(&self, planned: &mut Json, prior: Option<&Json>, _diags: &mut Diagnostics) {
        link_planned_pools(planned, prior);
    }

    async fn create(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: CreateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let mut model: LkeClusterModel = decode_model(&req.planned)?;
        let cluster = meta.client.create_lke_cluster(ctx, &model.create_options()?).await?;
        info!("Created LKE cluster {} ({})", cluster.label, cluster.id);

        model.id = meta.settle_id(model.id, cluster.id.to_string());
        resp.state = Some(encode_model(&model)?);

        let ctx = ctx.with_entity("lke_cluster", cluster.id);
        if !meta.config.skip_instance_ready_poll {
            let timeout = self.timeouts().create.min(FIRST_NODE_TIMEOUT);
            wait_for_ready_node(&ctx, meta, cluster.id, timeout).await?;
        }

        let snapshot = observe(&ctx, meta, cluster.id).await?;
        model.flatten(&snapshot, true);
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
        let mut model: LkeClusterModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        match observe(ctx, meta, id).await {
            Ok(snapshot) => {
                model.flatten(&snapshot, false);
                resp.state = Some(encode_model(&model)?);
                Ok(())
            }
            Err(err) => read_not_found(err, resp, "LKE Cluster", id),
        }
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &ProviderMeta,
        req: UpdateRequest,
        resp: &mut ResourceResponse,
    ) -> Result<()> {
        let prior: LkeClusterModel = decode_model(&req.prior)?;
        let mut plan: LkeClusterModel = decode_model(&req.planned)?;
        let id = parse_id(&prior.id)?;
        let ctx = ctx.with_entity("lke_cluster", id);
        let timeout = self.timeouts().update;
        plan.id = plan.id.fill_unknown(prior.id.clone());

        let version_changed = plan.k8s_version != prior.k8s_version;
        let opts = LkeClusterUpdateOptions {
            label: (plan.label != prior.label).then(|| plan.label.as_str().to_string()),
            k8s_version: version_changed.then(|| plan.k8s_version.as_str().to_string()),
            tags: if plan.tags == prior.tags {
                None
            } else {
                Some(strings(&plan.tags, "tags")?)
            },
            control_plane: if plan.control_plane.is_known() && plan.control_plane != prior.control_plane {
                plan.control_plane()
            } else {
                None
            },
        };
        if opts.label.is_some() || opts.k8s_version.is_some() || opts.tags.is_some() || opts.control_plane.is_some() {
            meta.client.update_lke_cluster(&ctx, id, &opts).await?;
            debug!("Updated LKE cluster {}", id);
        }

        let pools = meta.client.list_lke_node_pools(&ctx, id).await?;
        if version_changed {
            info!("Recycling LKE cluster {} to apply Kubernetes {}", id, plan.k8s_version.as_str());
            recycle_cluster(&ctx, meta, id, &pools, timeout).await?;
        }

        let updates = reconcile_pools(&plan.pool_specs(), &pools)?;
        debug!(
            "LKE cluster {}: {} pools to update, {} to create, {} to delete",
            id,
            updates.to_update.len(),
            updates.to_create.len(),
            updates.to_delete.len()
        );

        // Resize and add before deleting, so the cluster keeps its capacity
        // while a pool is swapped for one of another shape.
        let mut touched = Vec::new();
        for (pool_id, pool_opts) in &updates.to_update {
            meta.client.update_lke_node_pool(&ctx, id, *pool_id, pool_opts).await?;
            touched.push(*pool_id);
        }
        for pool_opts in &updates.to_create {
            let pool = meta.client.create_lke_node_pool(&ctx, id, pool_opts).await?;
            info!("Created pool {} in LKE cluster {}", pool.id, id);
            touched.push(pool.id);
        }
        for pool_id in &updates.to_delete {
            ignore_not_found(meta.client.delete_lke_node_pool(&ctx, id, *pool_id).await)?;
            info!("Deleted pool {} from LKE cluster {}", pool_id, id);
        }

        if !meta.config.skip_instance_ready_poll {
            for pool_id in touched {
                wait_for_pool_ready(&ctx, meta, id, pool_id, timeout).await?;
            }
        }

        let snapshot = observe(&ctx, meta, id).await?;
        plan.flatten(&snapshot, true);
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
        let model: LkeClusterModel = decode_model(&req.state)?;
        let id = parse_id(&model.id)?;
        ignore_not_found(meta.client.delete_lke_cluster(ctx, id).await)?;

        poll_until(
            ctx,
            &format!("LKE cluster {id} to be deleted"),
            meta.config.lke_event_poll_interval(),
            self.timeouts().delete,
            |ctx| async move {
                match meta.client.get_lke_cluster(&ctx, id).await {
                    Ok(_) => Ok(false),
                    Err(err) if err.is_not_found() => Ok(true),
                    Err(err) => Err(err),
                }
            },
            |gone| *gone,
        )
        .await?;
        info!("Deleted LKE cluster {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{PlanAction, Planner, StringValue, Value};
    use crate::linode::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meta(server: &MockServer) -> ProviderMeta {
        ProviderMeta::new(test_config(server)).expect("meta")
    }

    fn page(data: Json) -> Json {
        let results = data.as_array().map_or(0, Vec::len);
        json!({"data": data, "page": 1, "pages": 1, "results": results})
    }

    fn api_cluster() -> Json {
        json!({
            "id": 7, "label": "prod", "region": "us-east", "k8s_version": "1.31",
            "status": "ready", "tags": [], "control_plane": {"high_availability": false},
        })
    }

    fn api_pool(id: i64, count: i64) -> Json {
        json!({
            "id": id, "count": count, "type": "g6-standard-2",
            "nodes": (0..count)
                .map(|n| json!({"id": format!("{id}-{n}"), "instance_id": id * 100 + n, "status": "ready"}))
                .collect::<Vec<_>>(),
            "autoscaler": {"enabled": false, "min": count, "max": count},
            "tags": [],
        })
    }

    fn config(count: i64) -> Json {
        json!({
            "label": "prod", "region": "us-east", "k8s_version": "1.31",
            "pool": [{"type": "g6-standard-2", "count": count}],
        })
    }

    async fn mount_read(server: &MockServer, pools: Json) {
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_cluster()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(pools)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7/kubeconfig"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kubeconfig": "a3ViZQ=="})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7/api-endpoints"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(json!([{"endpoint": "https://7.k8s.example:443"}]))),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7/dashboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://dash.example"})))
            .mount(server)
            .await;
    }

    fn state_after_apply(config: &Json, pools: Json) -> Json {
        let mut model: LkeClusterModel = decode_model(config).expect("model");
        let snapshot = ClusterSnapshot {
            cluster: serde_json::from_value(api_cluster()).expect("cluster"),
            pools: serde_json::from_value(pools).expect("pools"),
            kubeconfig: String::from("a3ViZQ=="),
            api_endpoints: vec![String::from("https://7.k8s.example:443")],
            dashboard_url: String::from("https://dash.example"),
        };
        model.flatten(&snapshot, true);
        encode_model(&model).expect("state")
    }

    #[tokio::test]
    async fn test_create_waits_for_node_and_reads_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/lke/clusters"))
            .and(body_partial_json(json!({
                "label": "prod",
                "node_pools": [{"type": "g6-standard-2", "count": 2}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_cluster()))
            .expect(1)
            .mount(&server)
            .await;
        mount_read(&server, json!([api_pool(31, 2)])).await;

        let resource = LkeClusterResource::new();
        let config = config(2);
        let plan = Planner::new(resource.schema()).plan_with(None, &config, |planned, prior, diags| {
            resource.modify_plan(planned, prior, diags);
        });
        assert_eq!(plan.action, PlanAction::Create);

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

        let state: LkeClusterModel = decode_model(&resp.state.expect("state")).expect("model");
        assert_eq!(state.id, StringValue::from("7"));
        assert_eq!(state.kubeconfig, StringValue::from("a3ViZQ=="));
        let pools = state.declared_pools();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, Value::known(31));
        assert_eq!(pools[0].nodes.as_known().map(|n| n.0.len()), Some(2));
    }

    #[tokio::test]
    async fn test_update_resizes_pool_in_place() {
        let server = MockServer::start().await;
        mount_read(&server, json!([api_pool(31, 2)])).await;
        Mock::given(method("PUT"))
            .and(path("/v4/lke/clusters/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_cluster()))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v4/lke/clusters/7/pools/31"))
            .and(body_json(json!({"count": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_pool(31, 3)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7/pools/31"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_pool(31, 3)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/lke/clusters/7/recycle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let resource = LkeClusterResource::new();
        let prior = state_after_apply(&config(2), json!([api_pool(31, 2)]));
        let config = config(3);
        let plan = Planner::new(resource.schema()).plan_with(Some(&prior), &config, |planned, before, diags| {
            resource.modify_plan(planned, before, diags);
        });
        assert_eq!(plan.action, PlanAction::Update);
        assert_eq!(plan.planned_state["pool"][0]["id"], 31);

        let mut resp = ResourceResponse::with_state(prior.clone());
        resource
            .update(
                &OpContext::background(),
                &meta(&server),
                UpdateRequest {
                    prior,
                    planned: plan.planned_state,
                    config,
                },
                &mut resp,
            )
            .await
            .expect("update");
        assert!(resp.state.is_some());
    }

    #[test]
    fn test_unchanged_pools_plan_no_change() {
        let resource = LkeClusterResource::new();
        let prior = state_after_apply(&config(2), json!([api_pool(31, 2)]));
        let plan = Planner::new(resource.schema()).plan_with(Some(&prior), &config(2), |planned, before, diags| {
            resource.modify_plan(planned, before, diags);
        });
        assert_eq!(plan.action, PlanAction::NoChange, "{:?}", plan.changes);
    }

    #[test]
    fn test_region_change_replaces() {
        let resource = LkeClusterResource::new();
        let prior = state_after_apply(&config(2), json!([api_pool(31, 2)]));
        let mut config = config(2);
        config["region"] = json!("eu-west");
        let plan = Planner::new(resource.schema()).plan_with(Some(&prior), &config, |planned, before, diags| {
            resource.modify_plan(planned, before, diags);
        });
        assert_eq!(plan.action, PlanAction::Replace);
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v4/lke/clusters/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_cluster()))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/lke/clusters/7"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": [{"reason": "Not found"}]})))
            .mount(&server)
            .await;

        LkeClusterResource::new()
            .delete(
                &OpContext::background(),
                &meta(&server),
                DeleteRequest { state: json!({"id": "7"}) },
                &mut ResourceResponse::default(),
            )
            .await
            .expect("delete");
    }

    #[test]
    fn test_pool_needs_count_or_autoscaler() {
        let resource = LkeClusterResource::new();
        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"pool": [{"type": "g6-standard-1"}, {"type": "g6-standard-1", "count": 0}]}),
            &mut diags,
        );
        let messages: Vec<String> = diags.errors().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("pool.0: `count` must be defined when no autoscaler is defined"));

        let mut diags = Diagnostics::new();
        resource.validate_config(
            &json!({"pool": [{"type": "g6-standard-1", "autoscaler": {"min": 1, "max": 3}}]}),
            &mut diags,
        );
        assert!(!diags.has_error());

        let mut diags = Diagnostics::new();
        resource.validate_config(&json!({"pool": []}), &mut diags);
        assert!(diags.has_error());
    }
}
