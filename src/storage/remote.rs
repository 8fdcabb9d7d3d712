//! Networked object store backend
//!
//! Speaks the path-style object store REST dialect (S3 / MinIO compatible):
//!
//! | Operation          | Request                                        |
//! |--------------------|------------------------------------------------|
//! | ensure container   | `HEAD /{bucket}`, then `PUT /{bucket}` on 404  |
//! | list               | `GET /{bucket}?list-type=2&prefix=..`          |
//! | read               | `GET /{bucket}/{key}`                          |
//! | write              | `PUT /{bucket}/{key}`                          |
//!
//! An object only becomes visible once its `PUT` completes. Listings may lag
//! behind writes; scans tolerate that. Request signing is left to the
//! deployment (a signing proxy, or an optional static bearer token).

use crate::storage::backend::BlobBackend;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::segment::SegmentKey;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

/// Configuration for the object store backend
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the object store (e.g. "http://localhost:9000")
    pub endpoint: String,
    /// Bucket holding the segments
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Optional static token sent as `Authorization: Bearer ..`
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_bucket() -> String {
    "chronos-segments".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            bearer_token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Bucket used when none is configured
    pub fn default_bucket() -> String {
        default_bucket()
    }
}

/// `ListObjectsV2` response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListEntry>,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEntry {
    key: String,
}

/// Segment store in an object store bucket
pub struct RemoteBackend {
    client: Client,
    config: RemoteConfig,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket name must not be empty".into()));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.config.bucket)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_url(), urlencoding::encode(key))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StorageResult<ListBucketResult> {
        let mut query = vec![("list-type", "2"), ("prefix", prefix)];
        if let Some(token) = continuation {
            query.push(("continuation-token", token));
        }

        let response = self
            .authorize(self.client.get(self.bucket_url()).query(&query))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Backend(format!(
                "Listing bucket {} failed with status {}",
                self.config.bucket, status
            )));
        }

        let body = response.text().await?;
        quick_xml::de::from_str(&body).map_err(|e| {
            StorageError::Backend(format!("Malformed listing response: {}", e))
        })
    }
}

#[async_trait]
impl BlobBackend for RemoteBackend {
    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn ensure_container(&self) -> StorageResult<()> {
        let head = self
            .authorize(self.client.head(self.bucket_url()))
            .send()
            .await?;

        match head.status() {
            status if status.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(StorageError::Backend(format!(
                    "Checking bucket {} failed with status {}",
                    self.config.bucket, status
                )))
            }
        }

        let create = self
            .authorize(self.client.put(self.bucket_url()))
            .send()
            .await?;

        match create.status() {
            status if status.is_success() => {
                tracing::info!(bucket = %self.config.bucket, "Created bucket");
                Ok(())
            }
            // Created concurrently by another service
            StatusCode::CONFLICT => {
                tracing::debug!(bucket = %self.config.bucket, "Bucket already exists");
                Ok(())
            }
            status => Err(StorageError::Backend(format!(
                "Creating bucket {} failed with status {}",
                self.config.bucket, status
            ))),
        }
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self.list_page(prefix, continuation.as_deref()).await?;
            keys.extend(
                page.contents
                    .into_iter()
                    .map(|entry| entry.key)
                    .filter(|key| SegmentKey::is_segment_key(key)),
            );

            if !page.is_truncated {
                break;
            }
            match page.next_continuation_token {
                Some(token) => continuation = Some(token),
                None => {
                    return Err(StorageError::Backend(format!(
                        "Listing bucket {} is truncated but has no continuation token",
                        self.config.bucket
                    )))
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .authorize(self.client.get(self.object_url(key)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Backend(format!(
                "Reading {} failed with status {}",
                key, status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let size = data.len();
        let response = self
            .authorize(
                self.client
                    .put(self.object_url(key))
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(data),
            )
            .send()
            .await
            .map_err(|e| StorageError::Flush(format!("Uploading {} failed: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Flush(format!(
                "Uploading {} failed with status {}",
                key, status
            )));
        }

        tracing::debug!(key = %key, size, "Uploaded segment");
        Ok(())
    }
}
