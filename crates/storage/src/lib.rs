//! Object-store abstraction for processed artifacts.
//!
//! The pipeline uploads through the [`ObjectStore`] trait so it can be
//! exercised against an in-memory double in tests; production wires in
//! [`s3::S3ObjectStore`]. The store client is constructed once per
//! process and shared read-only across all uploads.

use std::path::Path;

pub mod s3;

/// Errors from an object-store upload.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bucket credentials are absent or incomplete.
    #[error("Object store is not configured")]
    NotConfigured,

    /// The local file to upload does not exist or is not readable.
    #[error("Local file missing or unreadable: {0}")]
    FileMissing(String),

    /// The local file exists but is empty; uploading it would produce a
    /// broken artifact URL.
    #[error("Local file is empty: {0}")]
    EmptyFile(String),

    /// The upload itself was rejected or failed in transit.
    #[error("Upload failed: {0}")]
    Upload(String),
}

/// A content-addressable artifact store.
///
/// Implementations must be safe to share across uploads (`Send + Sync`,
/// no interior mutation of connection state).
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `key` and return its public URL.
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

/// Store used when bucket credentials are absent. Every upload fails
/// with [`StoreError::NotConfigured`], which surfaces as a per-item
/// processing error rather than a crash.
pub struct UnconfiguredStore;

#[async_trait::async_trait]
impl ObjectStore for UnconfiguredStore {
    async fn upload(
        &self,
        _local_path: &Path,
        _key: &str,
        _content_type: &str,
    ) -> Result<String, StoreError> {
        Err(StoreError::NotConfigured)
    }
}
