//! Linode API integration module.
//!
//! This module provides the typed client for the Linode REST API (retry,
//! pagination, filtering, error decoding) and the pollers that turn
//! asynchronous server-side operations into bounded waits.

mod client;
mod domains;
mod events;
mod filter;
mod instances;
mod lke;
mod object_storage;
mod poller;
mod types;

pub use client::{LinodeClient, RetryPolicy};
pub use filter::{Filter, Order};
pub use poller::{EntityType, EventAction, EventPoller, poll_until};
pub use types::{
    BucketAccess, ConfigDevice, DiskStatus, Domain, DomainOptions, DomainRecord,
    DomainRecordOptions, Event, EventEntity, EventStatus, Instance, InstanceConfig, InstanceDisk,
    InstanceDiskCreateOptions, InstanceDiskUpdateOptions, InstanceStatus, LkeApiEndpoint,
    LkeCluster, LkeClusterCreateOptions, LkeClusterUpdateOptions, LkeControlPlane, LkeDashboard,
    LkeKubeconfig, LkeNode, LkeNodePool, LkeNodePoolAutoscaler, LkeNodePoolCreateOptions,
    LkeNodePoolUpdateOptions, LkeNodeStatus, ObjectStorageBucket, ObjectStorageKey,
    ObjectStorageKeyCreateOptions, ObjectStorageKeyUpdateOptions, Page,
};

#[cfg(test)]
pub(crate) use client::tests::{test_client, test_config};
