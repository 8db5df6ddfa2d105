//! Managed resource handlers.
//!
//! Each handler owns a schema and a state model; state crosses the host
//! boundary as JSON and is decoded into the model for every operation.

mod domain;
mod domain_record;
mod helpers;
mod instance;
mod instance_disk;
mod lke_cluster;
mod object_storage;

pub use domain::{DomainModel, DomainResource};
pub use domain_record::{DomainRecordModel, DomainRecordResource};
pub use instance::{
    boot_instance_sync, current_booted_config, random_root_pass, shutdown_instance_sync,
};
pub use instance_disk::{InstanceDiskModel, InstanceDiskResource};
pub use lke_cluster::LkeClusterResource;
pub use object_storage::{
    BucketAccessModel, ObjectModel, ObjectStorageKeyModel, ObjectStorageKeyResource,
    ObjectStorageObjectResource,
};
