//! Linode API types.
//!
//! Request and response structures for the REST endpoints the provider uses.
//! Field names follow the API's snake_case JSON.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One page of a list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Current page number, starting at 1.
    #[serde(default = "first_page")]
    pub page: u32,
    /// Total number of pages.
    #[serde(default = "first_page")]
    pub pages: u32,
    /// Total number of results across all pages.
    #[serde(default)]
    pub results: u32,
}

const fn first_page() -> u32 {
    1
}

// =============================================================================
// Instances
// =============================================================================

/// Instance power status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Powered on.
    Running,
    /// Powered off.
    Offline,
    /// Powering on.
    Booting,
    /// Power cycling.
    Rebooting,
    /// Powering off.
    ShuttingDown,
    /// Being provisioned.
    Provisioning,
    /// Being deleted.
    Deleting,
    /// Migrating between hosts.
    Migrating,
    /// Being rebuilt.
    Rebuilding,
    /// Being cloned.
    Cloning,
    /// Restoring from a backup.
    Restoring,
    /// Being resized.
    Resizing,
    /// Stopped.
    Stopped,
    /// Status not known to this client.
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Returns true for statuses that end with a powered-on instance.
    #[must_use]
    pub const fn is_booted(self) -> bool {
        matches!(self, Self::Running | Self::Booting | Self::Rebooting)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Offline => "offline",
            Self::Booting => "booting",
            Self::Rebooting => "rebooting",
            Self::ShuttingDown => "shutting_down",
            Self::Provisioning => "provisioning",
            Self::Deleting => "deleting",
            Self::Migrating => "migrating",
            Self::Rebuilding => "rebuilding",
            Self::Cloning => "cloning",
            Self::Restoring => "restoring",
            Self::Resizing => "resizing",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A compute instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    /// Instance id.
    pub id: i64,
    /// Label.
    pub label: String,
    /// Power status.
    pub status: InstanceStatus,
    /// Region id.
    #[serde(default)]
    pub region: String,
    /// Plan type id.
    #[serde(rename = "type", default)]
    pub instance_type: Option<String>,
}

/// A device slot of a configuration profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDevice {
    /// Attached disk id.
    pub disk_id: Option<i64>,
    /// Attached volume id.
    pub volume_id: Option<i64>,
}

/// An instance configuration profile.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Config id.
    pub id: i64,
    /// Label.
    #[serde(default)]
    pub label: String,
    /// Device slots (`sda`, `sdb`, ...).
    #[serde(default)]
    pub devices: BTreeMap<String, Option<ConfigDevice>>,
}

impl InstanceConfig {
    /// Returns true if any device slot holds the given disk.
    #[must_use]
    pub fn uses_disk(&self, disk_id: i64) -> bool {
        self.devices
            .values()
            .flatten()
            .any(|device| device.disk_id == Some(disk_id))
    }
}

/// Disk status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskStatus {
    /// Ready for use.
    #[serde(rename = "ready")]
    Ready,
    /// Still being created or resized.
    #[serde(rename = "not ready")]
    NotReady,
    /// Being deleted.
    #[serde(rename = "deleting")]
    Deleting,
    /// Status not known to this client.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::NotReady => "not ready",
            Self::Deleting => "deleting",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A disk attached to an instance.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceDisk {
    /// Disk id.
    pub id: i64,
    /// Label.
    pub label: String,
    /// Size in MB.
    pub size: i64,
    /// Filesystem.
    #[serde(default)]
    pub filesystem: String,
    /// Status.
    pub status: DiskStatus,
    /// Creation timestamp.
    #[serde(default)]
    pub created: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated: Option<String>,
    /// Disk encryption state.
    #[serde(default)]
    pub disk_encryption: Option<String>,
}

/// Options for creating a disk.
#[derive(Clone, Default, Serialize)]
pub struct InstanceDiskCreateOptions {
    /// Label.
    pub label: String,
    /// Size in MB.
    pub size: i64,
    /// Filesystem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<String>,
    /// Image to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Root password for image deployments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_pass: Option<String>,
    /// SSH public keys.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authorized_keys: Vec<String>,
    /// Users whose keys are installed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authorized_users: Vec<String>,
    /// StackScript to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stackscript_id: Option<i64>,
    /// StackScript UDF answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stackscript_data: Option<BTreeMap<String, String>>,
}

impl fmt::Debug for InstanceDiskCreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceDiskCreateOptions")
            .field("label", &self.label)
            .field("size", &self.size)
            .field("filesystem", &self.filesystem)
            .field("image", &self.image)
            .field("root_pass", &self.root_pass.as_ref().map(|_| "(sensitive value)"))
            .field("stackscript_id", &self.stackscript_id)
            .finish_non_exhaustive()
    }
}

/// Options for updating a disk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstanceDiskUpdateOptions {
    /// New label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// Event status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Queued.
    Scheduled,
    /// In progress.
    Started,
    /// Completed successfully.
    Finished,
    /// Completed with failure.
    Failed,
    /// Informational.
    Notification,
    /// Status not known to this client.
    #[serde(other)]
    Unknown,
}

/// The entity an event refers to.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEntity {
    /// Entity id; a number for most entity types.
    pub id: serde_json::Value,
    /// Entity type.
    #[serde(rename = "type", default)]
    pub entity_type: String,
    /// Entity label.
    #[serde(default)]
    pub label: Option<String>,
}

impl EventEntity {
    /// Entity id as an integer, when it is one.
    #[must_use]
    pub fn id_i64(&self) -> Option<i64> {
        match &self.id {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// An entry of the account event log.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event id; monotonically increasing per account.
    pub id: i64,
    /// Action name, such as `disk_create`.
    pub action: String,
    /// Status.
    pub status: EventStatus,
    /// Creation time (UTC).
    #[serde(default)]
    pub created: Option<NaiveDateTime>,
    /// Primary entity.
    #[serde(default)]
    pub entity: Option<EventEntity>,
    /// Secondary entity, such as the disk of a `disk_delete`.
    #[serde(default)]
    pub secondary_entity: Option<EventEntity>,
    /// Progress percentage.
    #[serde(default)]
    pub percent_complete: Option<i64>,
    /// Free-form message.
    #[serde(default)]
    pub message: Option<String>,
}

impl Event {
    /// Primary entity id.
    #[must_use]
    pub fn entity_id(&self) -> Option<i64> {
        self.entity.as_ref().and_then(EventEntity::id_i64)
    }

    /// Secondary entity id.
    #[must_use]
    pub fn secondary_entity_id(&self) -> Option<i64> {
        self.secondary_entity.as_ref().and_then(EventEntity::id_i64)
    }
}

// =============================================================================
// Domains
// =============================================================================

/// A DNS zone.
#[derive(Debug, Clone, Deserialize)]
pub struct Domain {
    /// Domain id.
    pub id: i64,
    /// Zone name.
    pub domain: String,
    /// `master` or `slave`.
    #[serde(rename = "type")]
    pub domain_type: String,
    /// Zone status.
    #[serde(default)]
    pub status: String,
    /// SOA email.
    #[serde(default)]
    pub soa_email: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Group label.
    #[serde(default)]
    pub group: String,
    /// Primary name servers for secondary zones.
    #[serde(default)]
    pub master_ips: Vec<String>,
    /// Addresses allowed to AXFR.
    #[serde(default)]
    pub axfr_ips: Vec<String>,
    /// Default TTL.
    #[serde(default)]
    pub ttl_sec: i64,
    /// SOA refresh.
    #[serde(default)]
    pub refresh_sec: i64,
    /// SOA retry.
    #[serde(default)]
    pub retry_sec: i64,
    /// SOA expire.
    #[serde(default)]
    pub expire_sec: i64,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Options for creating or updating a domain. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soa_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axfr_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// A DNS record.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainRecord {
    /// Record id.
    pub id: i64,
    /// Record type (`A`, `CNAME`, ...).
    #[serde(rename = "type")]
    pub record_type: String,
    /// Host name relative to the zone.
    #[serde(default)]
    pub name: String,
    /// Target.
    #[serde(default)]
    pub target: String,
    /// MX/SRV priority.
    #[serde(default)]
    pub priority: i64,
    /// SRV weight.
    #[serde(default)]
    pub weight: i64,
    /// SRV port.
    #[serde(default)]
    pub port: i64,
    /// SRV service.
    #[serde(default)]
    pub service: Option<String>,
    /// SRV protocol.
    #[serde(default)]
    pub protocol: Option<String>,
    /// TTL.
    #[serde(default)]
    pub ttl_sec: i64,
    /// CAA tag.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Options for creating or updating a DNS record. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainRecordOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

// =============================================================================
// LKE
// =============================================================================

/// Control plane settings of a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LkeControlPlane {
    /// Highly available control plane.
    #[serde(default)]
    pub high_availability: bool,
}

/// A Kubernetes cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct LkeCluster {
    /// Cluster id.
    pub id: i64,
    /// Label.
    pub label: String,
    /// Region id.
    pub region: String,
    /// Kubernetes version.
    pub k8s_version: String,
    /// Cluster status.
    #[serde(default)]
    pub status: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Control plane settings.
    #[serde(default)]
    pub control_plane: LkeControlPlane,
}

/// Autoscaler settings of a node pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LkeNodePoolAutoscaler {
    /// Whether the autoscaler is on.
    pub enabled: bool,
    /// Minimum node count.
    pub min: i64,
    /// Maximum node count.
    pub max: i64,
}

/// Readiness of a pool node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LkeNodeStatus {
    /// Joined the cluster.
    Ready,
    /// Still provisioning or recycling.
    NotReady,
    /// Status not known to this client.
    #[serde(other)]
    Unknown,
}

/// A node of a pool.
#[derive(Debug, Clone, Deserialize)]
pub struct LkeNode {
    /// Node id.
    pub id: String,
    /// Backing instance id.
    #[serde(default)]
    pub instance_id: Option<i64>,
    /// Readiness.
    pub status: LkeNodeStatus,
}

/// A node pool.
#[derive(Debug, Clone, Deserialize)]
pub struct LkeNodePool {
    /// Pool id.
    pub id: i64,
    /// Node count.
    pub count: i64,
    /// Instance type of every node.
    #[serde(rename = "type")]
    pub pool_type: String,
    /// Nodes.
    #[serde(default)]
    pub nodes: Vec<LkeNode>,
    /// Autoscaler settings.
    #[serde(default)]
    pub autoscaler: LkeNodePoolAutoscaler,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LkeNodePool {
    /// Returns true when no node reports `not_ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.nodes.iter().all(|node| node.status != LkeNodeStatus::NotReady)
    }
}

/// Options for creating a node pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LkeNodePoolCreateOptions {
    /// Node count.
    pub count: i64,
    /// Instance type.
    #[serde(rename = "type")]
    pub pool_type: String,
    /// Autoscaler settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaler: Option<LkeNodePoolAutoscaler>,
    /// Tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Options for updating a node pool. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LkeNodePoolUpdateOptions {
    /// New node count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// New autoscaler settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaler: Option<LkeNodePoolAutoscaler>,
    /// New tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Options for creating a cluster.
#[derive(Debug, Clone, Serialize)]
pub struct LkeClusterCreateOptions {
    pub label: String,
    pub region: String,
    pub k8s_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub node_pools: Vec<LkeNodePoolCreateOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<LkeControlPlane>,
}

/// Options for updating a cluster. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LkeClusterUpdateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k8s_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<LkeControlPlane>,
}

/// Kubeconfig of a cluster, base64-encoded.
#[derive(Clone, Deserialize)]
pub struct LkeKubeconfig {
    /// Encoded kubeconfig.
    pub kubeconfig: String,
}

impl fmt::Debug for LkeKubeconfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LkeKubeconfig")
            .field("kubeconfig", &"(sensitive value)")
            .finish()
    }
}

/// A Kubernetes API endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LkeApiEndpoint {
    /// Endpoint URL.
    pub endpoint: String,
}

/// Dashboard URL of a cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct LkeDashboard {
    /// Dashboard URL.
    pub url: String,
}

// =============================================================================
// Object storage
// =============================================================================

/// Bucket permission granted to a limited key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketAccess {
    /// Bucket label.
    pub bucket_name: String,
    /// Legacy cluster id (`us-east-1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Region id (`us-east`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// `read_only` or `read_write`.
    pub permissions: String,
}

/// An object storage access key.
#[derive(Clone, Deserialize)]
pub struct ObjectStorageKey {
    /// Key id.
    pub id: i64,
    /// Label.
    pub label: String,
    /// Access key.
    pub access_key: String,
    /// Secret key; only present in the create response.
    #[serde(default)]
    pub secret_key: String,
    /// Whether the key is limited to `bucket_access`.
    #[serde(default)]
    pub limited: bool,
    /// Granted bucket permissions.
    #[serde(default)]
    pub bucket_access: Option<Vec<BucketAccess>>,
}

impl fmt::Debug for ObjectStorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorageKey")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("access_key", &self.access_key)
            .field("secret_key", &"(sensitive value)")
            .field("limited", &self.limited)
            .field("bucket_access", &self.bucket_access)
            .finish()
    }
}

/// Options for creating an object storage key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectStorageKeyCreateOptions {
    /// Label.
    pub label: String,
    /// Restrict the key to these buckets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_access: Option<Vec<BucketAccess>>,
}

/// Options for updating an object storage key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectStorageKeyUpdateOptions {
    /// New label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// An object storage bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStorageBucket {
    /// Bucket label.
    pub label: String,
    /// Region id.
    #[serde(default)]
    pub region: Option<String>,
    /// Legacy cluster id.
    #[serde(default)]
    pub cluster: Option<String>,
    /// Bucket hostname.
    #[serde(default)]
    pub hostname: String,
    /// Endpoint generation (`E0` .. `E3`).
    #[serde(default)]
    pub endpoint_type: Option<String>,
    /// S3 endpoint hostname.
    #[serde(default)]
    pub s3_endpoint: Option<String>,
}
