//! LKE cluster and node pool endpoints.

use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::provider::OpContext;

use super::client::LinodeClient;
use super::types::{
    LkeApiEndpoint, LkeCluster, LkeClusterCreateOptions, LkeClusterUpdateOptions, LkeDashboard,
    LkeKubeconfig, LkeNodePool, LkeNodePoolCreateOptions, LkeNodePoolUpdateOptions,
};

impl LinodeClient {
    /// Gets a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_lke_cluster(&self, ctx: &OpContext, cluster_id: i64) -> Result<LkeCluster> {
        self.get(ctx, &format!("lke/clusters/{cluster_id}")).await
    }

    /// Creates a cluster with its initial pools.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_lke_cluster(&self, ctx: &OpContext, opts: &LkeClusterCreateOptions) -> Result<LkeCluster> {
        debug!(
            "Creating LKE cluster {} with {} pools",
            opts.label,
            opts.node_pools.len()
        );
        self.post(ctx, "lke/clusters", opts).await
    }

    /// Updates a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_lke_cluster(
        &self,
        ctx: &OpContext,
        cluster_id: i64,
        opts: &LkeClusterUpdateOptions,
    ) -> Result<LkeCluster> {
        self.put(ctx, &format!("lke/clusters/{cluster_id}"), opts).await
    }

    /// Deletes a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_lke_cluster(&self, ctx: &OpContext, cluster_id: i64) -> Result<()> {
        self.delete(ctx, &format!("lke/clusters/{cluster_id}")).await
    }

    /// Recycles every node of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn recycle_lke_cluster(&self, ctx: &OpContext, cluster_id: i64) -> Result<()> {
        self.post_action(ctx, &format!("lke/clusters/{cluster_id}/recycle"), &json!({}))
            .await
    }

    /// Lists the pools of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_lke_node_pools(&self, ctx: &OpContext, cluster_id: i64) -> Result<Vec<LkeNodePool>> {
        self.list(ctx, &format!("lke/clusters/{cluster_id}/pools"), None)
            .await
    }

    /// Gets a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_lke_node_pool(&self, ctx: &OpContext, cluster_id: i64, pool_id: i64) -> Result<LkeNodePool> {
        self.get(ctx, &format!("lke/clusters/{cluster_id}/pools/{pool_id}"))
            .await
    }

    /// Creates a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_lke_node_pool(
        &self,
        ctx: &OpContext,
        cluster_id: i64,
        opts: &LkeNodePoolCreateOptions,
    ) -> Result<LkeNodePool> {
        self.post(ctx, &format!("lke/clusters/{cluster_id}/pools"), opts)
            .await
    }

    /// Updates a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_lke_node_pool(
        &self,
        ctx: &OpContext,
        cluster_id: i64,
        pool_id: i64,
        opts: &LkeNodePoolUpdateOptions,
    ) -> Result<LkeNodePool> {
        self.put(ctx, &format!("lke/clusters/{cluster_id}/pools/{pool_id}"), opts)
            .await
    }

    /// Deletes a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_lke_node_pool(&self, ctx: &OpContext, cluster_id: i64, pool_id: i64) -> Result<()> {
        self.delete(ctx, &format!("lke/clusters/{cluster_id}/pools/{pool_id}"))
            .await
    }

    /// Gets the kubeconfig of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails; the API answers 503 until the
    /// control plane is up.
    pub async fn get_lke_kubeconfig(&self, ctx: &OpContext, cluster_id: i64) -> Result<LkeKubeconfig> {
        self.get(ctx, &format!("lke/clusters/{cluster_id}/kubeconfig"))
            .await
    }

    /// Lists the Kubernetes API endpoints of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_lke_api_endpoints(&self, ctx: &OpContext, cluster_id: i64) -> Result<Vec<LkeApiEndpoint>> {
        self.list(ctx, &format!("lke/clusters/{cluster_id}/api-endpoints"), None)
            .await
    }

    /// Gets the dashboard URL of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_lke_dashboard(&self, ctx: &OpContext, cluster_id: i64) -> Result<LkeDashboard> {
        self.get(ctx, &format!("lke/clusters/{cluster_id}/dashboard"))
            .await
    }
}
