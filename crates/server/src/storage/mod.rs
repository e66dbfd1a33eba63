use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

mod s3;

pub use s3::S3ObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not configured: {0}")]
    Config(String),
    #[error("presign failed: {0}")]
    Presign(String),
    #[error("{op} failed: {message}")]
    Request { op: &'static str, message: String },
}

impl From<StorageError> for shared_types::AppError {
    fn from(e: StorageError) -> Self {
        tracing::error!(error = %e, "object storage error");
        shared_types::AppError::external(format!("Object storage error: {e}"))
    }
}

/// Metadata returned by a HEAD on an existing object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMeta {
    pub size: Option<i64>,
    pub version_id: Option<String>,
    pub content_type: Option<String>,
}

/// A presigned upload slot. The client must send `required_headers` verbatim.
#[derive(Debug, Clone)]
pub struct PresignedPut {
    pub url: String,
    pub required_headers: HashMap<String, String>,
}

// ── Trait ────────────────────────────────────────────────────────────

/// Object storage for case documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket that keys are written to. Stored on each document row.
    fn bucket(&self) -> &str;

    /// Lifetime of presigned URLs in seconds.
    fn presign_expiry_secs(&self) -> u64;

    async fn presign_put(&self, key: &str, content_type: &str) -> Result<PresignedPut, StorageError>;

    async fn presign_get(&self, key: &str) -> Result<String, StorageError>;

    /// `None` when the object does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;

    async fn put(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Object key for a new document: `{advocate}/cases/{case}/{uuid}/{file}`.
pub fn document_key(advocate_id: Uuid, case_id: Uuid, file_name: &str) -> String {
    format!(
        "{}/cases/{}/{}/{}",
        advocate_id,
        case_id,
        Uuid::new_v4(),
        shared_types::sanitize_file_name(file_name)
    )
}

/// The file name segment of a document key.
pub fn file_name_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
