//! S3 credentials for object operations, minting a short-lived key when
//! neither the resource nor the provider supplies one.

use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::linode::{BucketAccess, LinodeClient, ObjectStorageKeyCreateOptions};
use crate::provider::{OpContext, ProviderMeta};

/// Gen2 endpoints take this long to accept a freshly minted key.
const KEY_PROPAGATION: Duration = Duration::from_secs(30);

/// Revoking a minted key gets its own deadline, independent of the
/// operation that used it.
const REVOKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Bucket labels are truncated so the key label stays within 50 characters.
const LABEL_BUCKET_CHARS: usize = 34;

static CLUSTER_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]+-[0-9]+$").ok());

fn is_cluster_id(region_or_cluster: &str) -> bool {
    CLUSTER_ID
        .as_ref()
        .is_some_and(|re| re.is_match(region_or_cluster))
}

/// Access level of a minted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// `read_only`.
    ReadOnly,
    /// `read_write`.
    ReadWrite,
}

impl Permission {
    /// API value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
        }
    }
}

/// An access/secret key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectKeys {
    /// Access key id.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
    /// Minted for one operation; may need time to propagate.
    pub temporary: bool,
}

impl ObjectKeys {
    fn from_pair(access_key: Option<&str>, secret_key: Option<&str>) -> Option<Self> {
        match (access_key, secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => Some(Self {
                access_key: access.to_string(),
                secret_key: secret.to_string(),
                temporary: false,
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for ObjectKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectKeys")
            .field("access_key", &self.access_key)
            .field("secret_key", &"(sensitive value)")
            .field("temporary", &self.temporary)
            .finish()
    }
}

/// What an object operation needs credentials for.
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    /// `access_key` declared on the resource.
    pub access_key: Option<&'a str>,
    /// `secret_key` declared on the resource.
    pub secret_key: Option<&'a str>,
    /// Bucket label.
    pub bucket: &'a str,
    /// Region id or legacy cluster id of the bucket.
    pub region_or_cluster: &'a str,
    /// Access the operation needs.
    pub permission: Permission,
}

/// Revokes a minted key. Dropping an unreleased guard revokes in the
/// background, so a cancelled operation does not leak the key.
struct Revocation {
    client: LinodeClient,
    key_id: Option<i64>,
}

impl Revocation {
    async fn revoke(mut self, ctx: &OpContext) {
        if let Some(key_id) = self.key_id.take() {
            revoke_key(&self.client, &ctx.teardown(REVOKE_TIMEOUT), key_id).await;
        }
    }
}

impl Drop for Revocation {
    fn drop(&mut self) {
        let Some(key_id) = self.key_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    let ctx = OpContext::background().with_timeout(REVOKE_TIMEOUT);
                    revoke_key(&client, &ctx, key_id).await;
                });
            }
            Err(_) => warn!("Temporary object storage key {} was not revoked", key_id),
        }
    }
}

async fn revoke_key(client: &LinodeClient, ctx: &OpContext, key_id: i64) {
    match client.delete_object_storage_key(ctx, key_id).await {
        Ok(()) => debug!("Revoked temporary object storage key {}", key_id),
        Err(e) => warn!("Failed to revoke temporary object storage key {}: {}", key_id, e),
    }
}

/// Credentials held for the length of one operation.
pub struct KeyLease {
    keys: ObjectKeys,
    revocation: Option<Revocation>,
}

impl fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLease")
            .field("keys", &self.keys)
            .field("temporary", &self.is_temporary())
            .finish()
    }
}

impl KeyLease {
    /// Leased keys.
    #[must_use]
    pub const fn keys(&self) -> &ObjectKeys {
        &self.keys
    }

    /// True when the keys were minted for this lease.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.revocation.is_some()
    }

    /// Revokes minted keys; a no-op for declared ones. Runs under a fresh
    /// deadline so an operation that timed out still cleans up.
    pub async fn release(self, ctx: &OpContext) {
        if let Some(revocation) = self.revocation {
            revocation.revoke(ctx).await;
        }
    }
}

/// Resolves credentials: resource keys, then provider keys, then a minted
/// key when `obj_use_temp_keys` is set.
///
/// # Errors
///
/// Returns a validation error when no source applies, or an API error if
/// minting fails.
pub async fn lease_keys(ctx: &OpContext, meta: &ProviderMeta, req: &KeyRequest<'_>) -> Result<KeyLease> {
    if let Some(keys) = ObjectKeys::from_pair(req.access_key, req.secret_key) {
        return Ok(KeyLease { keys, revocation: None });
    }
    if let Some(keys) = ObjectKeys::from_pair(
        meta.config.obj_access_key.as_deref(),
        meta.config.obj_secret_key.as_deref(),
    ) {
        return Ok(KeyLease { keys, revocation: None });
    }
    if !meta.config.obj_use_temp_keys {
        return Err(ConfigError::validation(
            "access_key and secret_key are required; set them on the resource or the provider, \
             or enable obj_use_temp_keys",
            "access_key",
        )
        .into());
    }

    let lease = mint_key(ctx, meta, req).await?;
    if let Err(e) = wait_for_propagation(ctx, meta, req).await {
        lease.release(ctx).await;
        return Err(e);
    }
    Ok(lease)
}

/// Runs `op` with leased credentials and releases them afterwards, whether
/// `op` succeeded or not.
///
/// # Errors
///
/// Returns the leasing error or the error of `op`.
pub async fn with_object_keys<T, F, Fut>(
    ctx: &OpContext,
    meta: &ProviderMeta,
    req: &KeyRequest<'_>,
    op: F,
) -> Result<T>
where
    F: FnOnce(ObjectKeys) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lease = lease_keys(ctx, meta, req).await?;
    let result = op(lease.keys().clone()).await;
    lease.release(ctx).await;
    result
}

fn temp_key_label(bucket: &str, unix: i64) -> String {
    let bucket: String = bucket.chars().take(LABEL_BUCKET_CHARS).collect();
    format!("temp_{bucket}_{unix}")
}

fn bucket_access(req: &KeyRequest<'_>) -> BucketAccess {
    let (cluster, region) = if is_cluster_id(req.region_or_cluster) {
        warn!(
            "{} is a cluster id; clusters are deprecated in favor of regions",
            req.region_or_cluster
        );
        (Some(req.region_or_cluster.to_string()), None)
    } else {
        (None, Some(req.region_or_cluster.to_string()))
    };
    BucketAccess {
        bucket_name: req.bucket.to_string(),
        cluster,
        region,
        permissions: req.permission.as_str().to_string(),
    }
}

async fn mint_key(ctx: &OpContext, meta: &ProviderMeta, req: &KeyRequest<'_>) -> Result<KeyLease> {
    let opts = ObjectStorageKeyCreateOptions {
        label: temp_key_label(req.bucket, chrono::Utc::now().timestamp()),
        bucket_access: Some(vec![bucket_access(req)]),
    };
    let key = meta.client.create_object_storage_key(ctx, &opts).await?;
    info!(
        "Created temporary {} key {} for bucket {}",
        req.permission.as_str(),
        key.id,
        req.bucket
    );
    Ok(KeyLease {
        keys: ObjectKeys {
            access_key: key.access_key,
            secret_key: key.secret_key,
            temporary: true,
        },
        revocation: Some(Revocation {
            client: meta.client.clone(),
            key_id: Some(key.id),
        }),
    })
}

/// Gen2 endpoints (`E2`, `E3`) accept new keys only after a delay.
async fn wait_for_propagation(ctx: &OpContext, meta: &ProviderMeta, req: &KeyRequest<'_>) -> Result<()> {
    let endpoint_type = match meta
        .client
        .get_object_storage_bucket(ctx, req.region_or_cluster, req.bucket)
        .await
    {
        Ok(bucket) => bucket.endpoint_type,
        Err(e) => {
            warn!(
                "Could not look up the endpoint type of bucket {}: {}; the key may not be usable yet",
                req.bucket, e
            );
            return Ok(());
        }
    };
    match endpoint_type.as_deref() {
        Some("E0" | "E1") | None => Ok(()),
        Some(other) => {
            debug!(
                "Bucket {} uses endpoint type {}; waiting for the key to propagate",
                req.bucket, other
            );
            ctx.sleep("temporary object storage key to propagate", KEY_PROPAGATION)
                .await
        }
    }
}
