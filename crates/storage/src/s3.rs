//! S3-compatible object store client.
//!
//! Works against any S3-compatible bucket endpoint (the production
//! deployment uses a Backblaze B2 bucket through its S3 endpoint).
//! Public artifact URLs follow the `{endpoint}/{bucket}/{key}` layout.

use std::path::Path;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;

use crate::{ObjectStore, StoreError};

/// Bucket connection settings, read from the environment.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Public endpoint URL, e.g. `https://s3.us-west-004.backblazeb2.com`.
    pub endpoint_url: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Config {
    /// Load bucket settings from `BUCKET_*` environment variables.
    ///
    /// Returns `None` when `BUCKET_ACCESS_KEY_ID` is unset -- the store
    /// is simply not configured, which is a job-level error only once an
    /// upload is actually attempted.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("BUCKET_ACCESS_KEY_ID").ok()?;
        Some(Self {
            endpoint_url: std::env::var("BUCKET_ENDPOINT_URL").unwrap_or_default(),
            bucket: std::env::var("BUCKET_NAME").unwrap_or_default(),
            region: std::env::var("BUCKET_REGION").unwrap_or_else(|_| "us-east-1".into()),
            access_key_id,
            secret_access_key: std::env::var("BUCKET_SECRET_ACCESS_KEY").unwrap_or_default(),
        })
    }

    /// Whether the settings are complete enough to upload.
    pub fn is_complete(&self) -> bool {
        !self.endpoint_url.is_empty()
            && !self.bucket.is_empty()
            && !self.access_key_id.is_empty()
            && !self.secret_access_key.is_empty()
    }
}

/// Object store backed by an S3-compatible bucket.
#[derive(Debug)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl S3ObjectStore {
    /// Build the SDK client from bucket settings.
    ///
    /// Idempotent and cheap enough to call once per process; connections
    /// are pooled inside the SDK client.
    pub async fn connect(config: &S3Config) -> Result<Self, StoreError> {
        if !config.is_complete() {
            return Err(StoreError::NotConfigured);
        }

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "bucket-env",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint_url)
            .load()
            .await;

        // Path-style addressing: S3-compatible endpoints rarely support
        // virtual-hosted bucket DNS.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        tracing::info!(bucket = %config.bucket, endpoint = %config.endpoint_url, "Object store client ready");

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base: config.endpoint_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|_| StoreError::FileMissing(local_path.to_string_lossy().to_string()))?;
        if metadata.len() == 0 {
            return Err(StoreError::EmptyFile(
                local_path.to_string_lossy().to_string(),
            ));
        }

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?;

        let url = format!("{}/{}/{}", self.public_base, self.bucket, key);
        tracing::debug!(key = %key, url = %url, "Artifact uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            endpoint_url: "https://s3.example.com".into(),
            bucket: "artifacts".into(),
            region: "us-east-1".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
        }
    }

    #[test]
    fn complete_config_is_detected() {
        assert!(config().is_complete());
    }

    #[test]
    fn missing_bucket_is_incomplete() {
        let mut c = config();
        c.bucket = String::new();
        assert!(!c.is_complete());
    }

    #[tokio::test]
    async fn connect_rejects_incomplete_config() {
        let mut c = config();
        c.endpoint_url = String::new();
        let err = S3ObjectStore::connect(&c).await.unwrap_err();
        assert!(matches!(err, StoreError::NotConfigured));
    }
}
