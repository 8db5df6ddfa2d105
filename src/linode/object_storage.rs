//! Object storage key and bucket endpoints.

use crate::error::Result;
use crate::provider::OpContext;

use super::client::LinodeClient;
use super::types::{
    ObjectStorageBucket, ObjectStorageKey, ObjectStorageKeyCreateOptions,
    ObjectStorageKeyUpdateOptions,
};

impl LinodeClient {
    /// Creates an access key. The response is the only one carrying the
    /// secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_object_storage_key(
        &self,
        ctx: &OpContext,
        opts: &ObjectStorageKeyCreateOptions,
    ) -> Result<ObjectStorageKey> {
        self.post(ctx, "object-storage/keys", opts).await
    }

    /// Gets an access key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_object_storage_key(&self, ctx: &OpContext, key_id: i64) -> Result<ObjectStorageKey> {
        self.get(ctx, &format!("object-storage/keys/{key_id}")).await
    }

    /// Updates an access key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_object_storage_key(
        &self,
        ctx: &OpContext,
        key_id: i64,
        opts: &ObjectStorageKeyUpdateOptions,
    ) -> Result<ObjectStorageKey> {
        self.put(ctx, &format!("object-storage/keys/{key_id}"), opts).await
    }

    /// Revokes an access key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_object_storage_key(&self, ctx: &OpContext, key_id: i64) -> Result<()> {
        self.delete(ctx, &format!("object-storage/keys/{key_id}")).await
    }

    /// Gets a bucket by region (or legacy cluster) and label.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_object_storage_bucket(
        &self,
        ctx: &OpContext,
        region_or_cluster: &str,
        label: &str,
    ) -> Result<ObjectStorageBucket> {
        self.get(ctx, &format!("object-storage/buckets/{region_or_cluster}/{label}"))
            .await
    }
}
