//! State model of `linode_lke_cluster` and the node-pool plan linking.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::Result;
use crate::framework::{
    BoolValue, Int64Value, List, ListValue, SetValue, StringValue, Value, list_of,
};
use crate::linode::{
    LkeCluster, LkeClusterCreateOptions, LkeControlPlane, LkeNode, LkeNodePool, LkeNodeStatus,
};

use super::pools::{PoolSpec, order_pools_like_declared};
use crate::resources::helpers::{merge, refreshed_set, string_or_null, strings};

/// Autoscaler bounds of a pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerModel {
    /// Lower bound.
    pub min: Int64Value,
    /// Upper bound.
    pub max: Int64Value,
}

/// A node of a pool, as last observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeModel {
    pub id: StringValue,
    pub instance_id: Int64Value,
    pub status: StringValue,
}

/// One `pool` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolModel {
    /// Server-assigned pool id.
    pub id: Int64Value,
    /// Instance type of every node.
    #[serde(rename = "type")]
    pub pool_type: StringValue,
    /// Node count; may be left to the autoscaler.
    pub count: Int64Value,
    /// Autoscaler bounds; `Null` when the autoscaler is off.
    pub autoscaler: Value<AutoscalerModel>,
    /// Nodes.
    pub nodes: ListValue<NodeModel>,
    /// Pool tags.
    pub tags: SetValue<String>,
}

/// Control plane block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneModel {
    pub high_availability: BoolValue,
}

/// State of a `linode_lke_cluster`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LkeClusterModel {
    /// Cluster id.
    pub id: StringValue,
    /// Label.
    pub label: StringValue,
    /// Region; changing it replaces the cluster.
    pub region: StringValue,
    /// Kubernetes version; changing it recycles every node.
    pub k8s_version: StringValue,
    /// Cluster tags.
    pub tags: SetValue<String>,
    /// Cluster status.
    pub status: StringValue,
    /// Base64 kubeconfig.
    pub kubeconfig: StringValue,
    /// Dashboard URL.
    pub dashboard_url: StringValue,
    /// Kubernetes API endpoints.
    pub api_endpoints: ListValue<String>,
    /// Control plane settings.
    pub control_plane: Value<ControlPlaneModel>,
    /// Node pools, in declared order.
    pub pool: ListValue<PoolModel>,
}

/// Everything read back about a cluster.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub cluster: LkeCluster,
    pub pools: Vec<LkeNodePool>,
    pub kubeconfig: String,
    pub api_endpoints: Vec<String>,
    pub dashboard_url: String,
}

const fn node_status(status: LkeNodeStatus) -> &'static str {
    match status {
        LkeNodeStatus::Ready => "ready",
        LkeNodeStatus::NotReady => "not_ready",
        LkeNodeStatus::Unknown => "unknown",
    }
}

impl NodeModel {
    fn from_api(node: &LkeNode) -> Self {
        Self {
            id: Value::known(node.id.clone()),
            instance_id: Value::from_option(node.instance_id),
            status: Value::known(node_status(node.status).to_string()),
        }
    }
}

impl PoolModel {
    /// The pool as the reconciler sees it. An undeclared count reads as 0.
    #[must_use]
    pub fn spec(&self) -> PoolSpec {
        PoolSpec {
            id: self.id.as_known().copied(),
            pool_type: self.pool_type.as_str().to_string(),
            count: self.count.as_known().copied().unwrap_or(0),
            autoscaler: self
                .autoscaler
                .as_known()
                .map(|a| (a.min.value_or_zero(), a.max.value_or_zero())),
            tags: self
                .tags
                .as_known()
                .map(|set| set.0.iter().filter_map(|t| t.as_known().cloned()).collect())
                .unwrap_or_default(),
        }
    }

    fn from_api(pool: &LkeNodePool, declared: Option<&Self>) -> Self {
        let declared_tags = declared.map(|d| d.tags.clone()).unwrap_or_default();
        Self {
            id: Value::known(pool.id),
            pool_type: Value::known(pool.pool_type.clone()),
            count: Value::known(pool.count),
            autoscaler: if pool.autoscaler.enabled {
                Value::known(AutoscalerModel {
                    min: Value::known(pool.autoscaler.min),
                    max: Value::known(pool.autoscaler.max),
                })
            } else {
                Value::Null
            },
            nodes: list_of(pool.nodes.iter().map(NodeModel::from_api)),
            tags: refreshed_set(&declared_tags, &pool.tags),
        }
    }

    /// Whether this planned pool denotes the prior pool `before`.
    fn links_to(&self, before: &Self) -> bool {
        if let Some(id) = self.id.as_known() {
            return before.id.as_known() == Some(id);
        }
        let count_matches = (self.count.is_null() && self.autoscaler.is_known()) || self.count == before.count;
        self.pool_type == before.pool_type && self.autoscaler == before.autoscaler && count_matches
    }
}

impl LkeClusterModel {
    /// Declared pools, skipping entries that are not yet known.
    #[must_use]
    pub fn declared_pools(&self) -> Vec<PoolModel> {
        self.pool
            .as_known()
            .map(|list| list.0.iter().filter_map(|p| p.as_known().cloned()).collect())
            .unwrap_or_default()
    }

    /// Declared pools as reconciler specs.
    #[must_use]
    pub fn pool_specs(&self) -> Vec<PoolSpec> {
        self.declared_pools().iter().map(PoolModel::spec).collect()
    }

    /// Declared control plane, if any.
    #[must_use]
    pub fn control_plane(&self) -> Option<LkeControlPlane> {
        self.control_plane.as_known().map(|cp| LkeControlPlane {
            high_availability: cp.high_availability.as_known().copied().unwrap_or(false),
        })
    }

    /// Builds the create request. Pools left to the autoscaler start at
    /// their minimum.
    ///
    /// # Errors
    ///
    /// Returns an error if a set holds unknown elements or a pool has
    /// neither a count nor an autoscaler.
    pub fn create_options(&self) -> Result<LkeClusterCreateOptions> {
        let node_pools = self
            .pool_specs()
            .iter()
            .map(|spec| Ok(spec.create_options(spec.effective_count()?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(LkeClusterCreateOptions {
            label: self.label.as_str().to_string(),
            region: self.region.as_str().to_string(),
            k8s_version: self.k8s_version.as_str().to_string(),
            tags: strings(&self.tags, "tags")?,
            node_pools,
            control_plane: self.control_plane(),
        })
    }

    /// Merges a read-back snapshot into the model. Pools always take the
    /// server's view, ordered like the declared blocks.
    pub fn flatten(&mut self, snapshot: &ClusterSnapshot, preserve_known: bool) {
        let cluster = &snapshot.cluster;
        merge(&mut self.id, Value::known(cluster.id.to_string()), preserve_known);
        merge(&mut self.label, Value::known(cluster.label.clone()), preserve_known);
        merge(&mut self.region, Value::known(cluster.region.clone()), preserve_known);
        merge(&mut self.k8s_version, Value::known(cluster.k8s_version.clone()), preserve_known);
        let tags = refreshed_set(&self.tags, &cluster.tags);
        merge(&mut self.tags, tags, preserve_known);

        self.status = string_or_null(&cluster.status);
        self.kubeconfig = Value::known(snapshot.kubeconfig.clone());
        self.dashboard_url = string_or_null(&snapshot.dashboard_url);
        self.api_endpoints = list_of(snapshot.api_endpoints.iter().cloned());
        self.control_plane = Value::known(ControlPlaneModel {
            high_availability: Value::known(cluster.control_plane.high_availability),
        });

        let declared = self.declared_pools();
        let specs: Vec<PoolSpec> = declared.iter().map(PoolModel::spec).collect();
        let ordered = order_pools_like_declared(&specs, snapshot.pools.clone());
        self.pool = Value::known(List(
            ordered
                .iter()
                .enumerate()
                .map(|(i, pool)| Value::known(PoolModel::from_api(pool, declared.get(i))))
                .collect(),
        ));
    }
}

/// Plan hook: links each planned pool to the prior pool it denotes so
/// unchanged pools plan no diff.
///
/// Pools with the same id or shape inherit the prior id, nodes and, when
/// undeclared, the count. Remaining pools of the same type are paired by
/// the smallest count difference and keep only the prior id. Everything
/// else is a new pool with unknown id and nodes.
pub fn link_planned_pools(planned: &mut Json, prior: Option<&Json>) {
    let Some(slot) = planned.get_mut("pool") else {
        return;
    };
    let Ok(Value::Known(List(mut declared))) = ListValue::<PoolModel>::from_json(slot.clone()) else {
        return;
    };

    let before: Vec<PoolModel> = prior
        .and_then(|p| p.get("pool"))
        .and_then(|raw| ListValue::<PoolModel>::from_json(raw.clone()).ok())
        .and_then(Value::into_known)
        .map(|list| list.0.into_iter().filter_map(Value::into_known).collect())
        .unwrap_or_default();
    let mut linked = vec![false; before.len()];
    let mut resolved = vec![false; declared.len()];

    for (i, item) in declared.iter_mut().enumerate() {
        let Value::Known(pool) = item else {
            resolved[i] = true;
            continue;
        };
        if let Some(j) = (0..before.len()).find(|&j| !linked[j] && pool.links_to(&before[j])) {
            linked[j] = true;
            resolved[i] = true;
            pool.id = before[j].id.clone();
            pool.nodes = before[j].nodes.clone();
            if pool.count.is_null() {
                pool.count = before[j].count.clone();
            }
        }
    }

    let mut candidates = Vec::new();
    for (i, item) in declared.iter().enumerate() {
        let Value::Known(pool) = item else { continue };
        if resolved[i] || pool.id.is_known() {
            continue;
        }
        for (j, old) in before.iter().enumerate() {
            if !linked[j] && old.pool_type == pool.pool_type {
                let diff = match (pool.count.as_known(), old.count.as_known()) {
                    (Some(a), Some(b)) => (a - b).abs(),
                    _ => 0,
                };
                candidates.push((diff, i, j));
            }
        }
    }
    candidates.sort_unstable();
    for (_, i, j) in candidates {
        if resolved[i] || linked[j] {
            continue;
        }
        if let Value::Known(pool) = &mut declared[i] {
            resolved[i] = true;
            linked[j] = true;
            pool.id = before[j].id.clone();
        }
    }

    for item in &mut declared {
        let Value::Known(pool) = item else { continue };
        if pool.id.is_null() {
            pool.id = Value::Unknown;
        }
        if pool.nodes.is_null() {
            pool.nodes = Value::Unknown;
        }
        if pool.count.is_null() {
            pool.count = Value::Unknown;
        }
    }

    if let Ok(normalized) = serde_json::to_value(Value::known(List(declared))) {
        *slot = normalized;
    }
}
