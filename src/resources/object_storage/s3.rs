//! S3-protocol calls against Linode Object Storage.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{
    Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use crate::error::{ProviderError, ReconcileError};

use super::credentials::ObjectKeys;

/// A failed S3 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Failure {
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Rendered SDK error.
    pub message: String,
}

impl S3Failure {
    fn from_sdk<E, R>(operation: &str, err: &SdkError<E, R>, status: Option<u16>) -> Self
    where
        E: std::error::Error + 'static,
        R: fmt::Debug,
    {
        Self {
            status,
            message: format!("{operation}: {}", DisplayErrorContext(err)),
        }
    }

    /// The object (or its bucket) is gone. A removed bucket answers 403.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.status, Some(403 | 404))
    }

    /// The credentials were refused; fresh keys report this until they
    /// propagate.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }
}

impl fmt::Display for S3Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<S3Failure> for ProviderError {
    fn from(failure: S3Failure) -> Self {
        ReconcileError::object_storage(failure.message).into()
    }
}

fn status_of<E>(err: &SdkError<E, aws_sdk_s3::config::http::HttpResponse>) -> Option<u16> {
    err.raw_response().map(|raw| raw.status().as_u16())
}

/// Object write parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObject {
    /// Object body.
    pub body: Vec<u8>,
    /// Canned ACL.
    pub acl: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `x-amz-website-redirect-location`.
    pub website_redirect: Option<String>,
    /// User metadata.
    pub metadata: BTreeMap<String, String>,
}

/// Headers returned by `HeadObject`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// Entity tag with the surrounding quotes removed.
    pub etag: Option<String>,
    /// Version id on versioned buckets.
    pub version_id: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `x-amz-website-redirect-location`.
    pub website_redirect: Option<String>,
    /// User metadata, keys lowercased.
    pub metadata: BTreeMap<String, String>,
}

/// Removes the quotes S3 wraps around entity tags.
#[must_use]
pub fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Full endpoint URL; bare hostnames get `https://`.
#[must_use]
pub fn endpoint_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

/// An S3 client bound to one endpoint and key pair.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    client: Client,
}

impl ObjectStore {
    /// Builds a path-style client for `endpoint`.
    pub async fn connect(endpoint: &str, keys: &ObjectKeys) -> Self {
        debug!("Creating object storage client for {}", endpoint);
        let credentials = Credentials::new(
            keys.access_key.clone(),
            keys.secret_key.clone(),
            None,
            None,
            "linode-provider",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .endpoint_url(endpoint_url(endpoint))
            .load()
            .await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }

    /// Writes an object.
    ///
    /// # Errors
    ///
    /// Returns the failed request.
    pub async fn put(&self, bucket: &str, key: &str, object: &PutObject) -> Result<(), S3Failure> {
        let metadata: HashMap<String, String> = object
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(object.body.clone()))
            .set_acl(object.acl.as_deref().map(ObjectCannedAcl::from))
            .set_cache_control(object.cache_control.clone())
            .set_content_disposition(object.content_disposition.clone())
            .set_content_encoding(object.content_encoding.clone())
            .set_content_language(object.content_language.clone())
            .set_content_type(object.content_type.clone())
            .set_website_redirect_location(object.website_redirect.clone())
            .set_metadata((!metadata.is_empty()).then_some(metadata))
            .send()
            .await
            .map_err(|e| S3Failure::from_sdk("PutObject", &e, status_of(&e)))?;
        debug!("Put object {}/{}", bucket, key);
        Ok(())
    }

    /// Reads object headers; `None` when the object or bucket is gone.
    ///
    /// # Errors
    ///
    /// Returns any other failed request.
    pub async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>, S3Failure> {
        let out = match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(out) => out,
            Err(e) => {
                let failure = S3Failure::from_sdk("HeadObject", &e, status_of(&e));
                let missing = e.into_service_error().is_not_found();
                if missing || failure.is_not_found() {
                    return Ok(None);
                }
                return Err(failure);
            }
        };
        Ok(Some(ObjectHead {
            etag: out.e_tag().map(trim_etag),
            version_id: out.version_id().map(str::to_string),
            cache_control: out.cache_control().map(str::to_string),
            content_disposition: out.content_disposition().map(str::to_string),
            content_encoding: out.content_encoding().map(str::to_string),
            content_language: out.content_language().map(str::to_string),
            content_type: out.content_type().map(str::to_string),
            website_redirect: out.website_redirect_location().map(str::to_string),
            metadata: out
                .metadata()
                .map(|m| m.iter().map(|(k, v)| (k.to_lowercase(), v.clone())).collect())
                .unwrap_or_default(),
        }))
    }

    /// Replaces the canned ACL of an object.
    ///
    /// # Errors
    ///
    /// Returns the failed request.
    pub async fn put_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<(), S3Failure> {
        self.client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(acl))
            .send()
            .await
            .map_err(|e| S3Failure::from_sdk("PutObjectAcl", &e, status_of(&e)))?;
        Ok(())
    }

    /// Deletes one object (or one version of it). Missing objects are not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns any other failed request.
    pub async fn delete(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_retention: bool,
    ) -> Result<(), S3Failure> {
        let result = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .set_bypass_governance_retention(bypass_retention.then_some(true))
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let failure = S3Failure::from_sdk("DeleteObject", &e, status_of(&e));
                if failure.status == Some(404) {
                    debug!("Object {}/{} was already deleted", bucket, key);
                    return Ok(());
                }
                Err(failure)
            }
        }
    }

    /// Deletes every version and delete marker of `key`.
    ///
    /// # Errors
    ///
    /// Returns the first failed request.
    pub async fn delete_all_versions(
        &self,
        bucket: &str,
        key: &str,
        bypass_retention: bool,
    ) -> Result<(), S3Failure> {
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;
        loop {
            let page = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .prefix(key)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(|e| S3Failure::from_sdk("ListObjectVersions", &e, status_of(&e)))?;

            let versions = page
                .versions()
                .iter()
                .map(|v| (v.key(), v.version_id()))
                .chain(page.delete_markers().iter().map(|m| (m.key(), m.version_id())));
            for (version_key, version_id) in versions {
                if version_key != Some(key) {
                    continue;
                }
                self.delete(bucket, key, version_id, bypass_retention).await?;
            }

            if page.is_truncated() != Some(true) {
                return Ok(());
            }
            key_marker = page.next_key_marker().map(str::to_string);
            version_marker = page.next_version_id_marker().map(str::to_string);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn keys() -> ObjectKeys {
        ObjectKeys {
            access_key: String::from("AK"),
            secret_key: String::from("SK"),
            temporary: false,
        }
    }

    #[test]
    fn test_endpoint_and_etag_helpers() {
        assert_eq!(endpoint_url("us-east-1.linodeobjects.com"), "https://us-east-1.linodeobjects.com");
        assert_eq!(endpoint_url("http://127.0.0.1:9000"), "http://127.0.0.1:9000");
        assert_eq!(trim_etag("\"abc123\""), "abc123");
    }

    #[test]
    fn test_failure_classification() {
        let gone = S3Failure {
            status: Some(403),
            message: String::from("Forbidden"),
        };
        assert!(gone.is_not_found());
        assert!(gone.is_access_denied());
        let broken = S3Failure {
            status: Some(500),
            message: String::from("boom"),
        };
        assert!(!broken.is_not_found());
        let err: ProviderError = broken.into();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_put_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/assets/site/index.html"))
            .and(header("content-type", "text/html"))
            .and(header("x-amz-acl", "public-read"))
            .and(header("x-amz-meta-owner", "web"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"e1\""))
            .expect(1)
            .mount(&server)
            .await;

        let store = ObjectStore::connect(&server.uri(), &keys()).await;
        let object = PutObject {
            body: b"<html></html>".to_vec(),
            acl: Some(String::from("public-read")),
            content_type: Some(String::from("text/html")),
            metadata: BTreeMap::from([(String::from("owner"), String::from("web"))]),
            ..PutObject::default()
        };
        store
            .put("assets", "site/index.html", &object)
            .await
            .expect("put");
    }

    #[tokio::test]
    async fn test_head_reads_and_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/assets/a.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"abc\"")
                    .insert_header("Content-Type", "text/plain")
                    .insert_header("x-amz-meta-Team", "infra"),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/assets/gone.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = ObjectStore::connect(&server.uri(), &keys()).await;
        let head = store.head("assets", "a.txt").await.expect("head").expect("exists");
        assert_eq!(head.etag.as_deref(), Some("abc"));
        assert_eq!(head.content_type.as_deref(), Some("text/plain"));
        assert_eq!(head.metadata.get("team").map(String::as_str), Some("infra"));

        assert!(store.head("assets", "gone.txt").await.expect("head").is_none());
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/assets/a.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let store = ObjectStore::connect(&server.uri(), &keys()).await;
        store
            .delete("assets", "a.txt", None, false)
            .await
            .expect("delete");
    }
}
