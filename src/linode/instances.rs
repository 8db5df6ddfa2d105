//! Instance, config and disk endpoints.

use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::provider::OpContext;

use super::client::LinodeClient;
use super::types::{
    Instance, InstanceConfig, InstanceDisk, InstanceDiskCreateOptions, InstanceDiskUpdateOptions,
};

impl LinodeClient {
    /// Gets an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_instance(&self, ctx: &OpContext, linode_id: i64) -> Result<Instance> {
        self.get(ctx, &format!("linode/instances/{linode_id}")).await
    }

    /// Gets a configuration profile of an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_instance_config(
        &self,
        ctx: &OpContext,
        linode_id: i64,
        config_id: i64,
    ) -> Result<InstanceConfig> {
        self.get(ctx, &format!("linode/instances/{linode_id}/configs/{config_id}"))
            .await
    }

    /// Boots an instance, optionally into a specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn boot_instance(&self, ctx: &OpContext, linode_id: i64, config_id: Option<i64>) -> Result<()> {
        debug!("Booting instance {linode_id} (config {config_id:?})");
        let body = config_id.map_or_else(|| json!({}), |id| json!({ "config_id": id }));
        self.post_action(ctx, &format!("linode/instances/{linode_id}/boot"), &body)
            .await
    }

    /// Reboots an instance, optionally into a specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn reboot_instance(&self, ctx: &OpContext, linode_id: i64, config_id: Option<i64>) -> Result<()> {
        debug!("Rebooting instance {linode_id} (config {config_id:?})");
        let body = config_id.map_or_else(|| json!({}), |id| json!({ "config_id": id }));
        self.post_action(ctx, &format!("linode/instances/{linode_id}/reboot"), &body)
            .await
    }

    /// Shuts an instance down.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn shutdown_instance(&self, ctx: &OpContext, linode_id: i64) -> Result<()> {
        debug!("Shutting down instance {linode_id}");
        self.post_action(ctx, &format!("linode/instances/{linode_id}/shutdown"), &json!({}))
            .await
    }

    /// Gets a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_instance_disk(&self, ctx: &OpContext, linode_id: i64, disk_id: i64) -> Result<InstanceDisk> {
        self.get(ctx, &format!("linode/instances/{linode_id}/disks/{disk_id}"))
            .await
    }

    /// Creates a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_instance_disk(
        &self,
        ctx: &OpContext,
        linode_id: i64,
        opts: &InstanceDiskCreateOptions,
    ) -> Result<InstanceDisk> {
        debug!("Creating disk on instance {linode_id}: {opts:?}");
        self.post(ctx, &format!("linode/instances/{linode_id}/disks"), opts)
            .await
    }

    /// Updates a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_instance_disk(
        &self,
        ctx: &OpContext,
        linode_id: i64,
        disk_id: i64,
        opts: &InstanceDiskUpdateOptions,
    ) -> Result<InstanceDisk> {
        self.put(ctx, &format!("linode/instances/{linode_id}/disks/{disk_id}"), opts)
            .await
    }

    /// Resizes a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn resize_instance_disk(
        &self,
        ctx: &OpContext,
        linode_id: i64,
        disk_id: i64,
        size: i64,
    ) -> Result<()> {
        debug!("Resizing disk {disk_id} of instance {linode_id} to {size} MB");
        self.post_action(
            ctx,
            &format!("linode/instances/{linode_id}/disks/{disk_id}/resize"),
            &json!({ "size": size }),
        )
        .await
    }

    /// Deletes a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_instance_disk(&self, ctx: &OpContext, linode_id: i64, disk_id: i64) -> Result<()> {
        self.delete(ctx, &format!("linode/instances/{linode_id}/disks/{disk_id}"))
            .await
    }
}
