//! Object storage resources: access keys, and objects written over the S3
//! protocol with credentials from the resource, the provider, or a
//! temporary key minted for the operation.

mod credentials;
mod key;
mod object;
mod s3;

pub use key::{BucketAccessModel, ObjectStorageKeyModel, ObjectStorageKeyResource};
pub use object::{ObjectModel, ObjectStorageObjectResource};
