use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::ServerSideEncryption,
    Client,
};

use super::{ObjectMeta, ObjectStore, PresignedPut, StorageError};

/// Read an env var, trying the primary name first then a fallback.
fn env_or(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .or_else(|| std::env::var(fallback).ok())
        .filter(|v| !v.is_empty())
}

/// S3-compatible object store (AWS, MinIO, RustFS).
/// All uploads are encrypted with SSE-S3 (AES256).
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    /// Build from environment variables:
    ///   - `AWS_ENDPOINT_URL_S3`   / `S3_ENDPOINT`
    ///   - `AWS_ACCESS_KEY_ID`     / `S3_ACCESS_KEY`
    ///   - `AWS_SECRET_ACCESS_KEY` / `S3_SECRET_KEY`
    ///   - `AWS_REGION`            / `S3_REGION`
    ///   - `DOCUMENTS_BUCKET` (default `documents`)
    pub fn from_env(presign_expiry_secs: u64) -> Result<Self, StorageError> {
        let endpoint = env_or("AWS_ENDPOINT_URL_S3", "S3_ENDPOINT")
            .ok_or_else(|| StorageError::Config("AWS_ENDPOINT_URL_S3 or S3_ENDPOINT".into()))?;
        let access_key = env_or("AWS_ACCESS_KEY_ID", "S3_ACCESS_KEY")
            .ok_or_else(|| StorageError::Config("AWS_ACCESS_KEY_ID or S3_ACCESS_KEY".into()))?;
        let secret_key = env_or("AWS_SECRET_ACCESS_KEY", "S3_SECRET_KEY").ok_or_else(|| {
            StorageError::Config("AWS_SECRET_ACCESS_KEY or S3_SECRET_KEY".into())
        })?;
        let region = env_or("AWS_REGION", "S3_REGION").unwrap_or_else(|| "ap-south-1".to_string());
        let bucket = std::env::var("DOCUMENTS_BUCKET").unwrap_or_else(|_| "documents".to_string());

        let creds = Credentials::new(&access_key, &secret_key, None, None, "env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new(region))
            .credentials_provider(creds)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket,
            presign_expiry: Duration::from_secs(presign_expiry_secs),
        })
    }

    /// Create the documents bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) {
        let exists = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok();

        if !exists {
            tracing::info!(bucket = %self.bucket, "creating documents bucket");
            if let Err(e) = self.client.create_bucket().bucket(&self.bucket).send().await {
                tracing::warn!(bucket = %self.bucket, error = %e, "failed to create documents bucket");
            }
        }
    }

    fn presign_config(&self) -> Result<PresigningConfig, StorageError> {
        PresigningConfig::builder()
            .expires_in(self.presign_expiry)
            .build()
            .map_err(|e| StorageError::Presign(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn presign_expiry_secs(&self) -> u64 {
        self.presign_expiry.as_secs()
    }

    #[tracing::instrument(skip(self))]
    async fn presign_put(&self, key: &str, content_type: &str) -> Result<PresignedPut, StorageError> {
        // SSE is not signed into the URL (some S3-compatible backends then
        // answer 403); it is handed back as a required header instead.
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(self.presign_config()?)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let mut required_headers = HashMap::new();
        required_headers.insert("Content-Type".to_string(), content_type.to_string());
        required_headers.insert(
            "x-amz-server-side-encryption".to_string(),
            "AES256".to_string(),
        );

        Ok(PresignedPut {
            url: presigned.uri().to_string(),
            required_headers,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn presign_get(&self, key: &str) -> Result<String, StorageError> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(self.presign_config()?)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => Ok(Some(ObjectMeta {
                size: out.content_length(),
                version_id: out.version_id().map(str::to_string),
                content_type: out.content_type().map(str::to_string),
            })),
            Err(e) => {
                let svc_err = e.into_service_error();
                if svc_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(StorageError::Request {
                        op: "HEAD",
                        message: svc_err.to_string(),
                    })
                }
            }
        }
    }

    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let svc = e.into_service_error();
                tracing::error!(key, error = ?svc, "S3 PutObject failed");
                StorageError::Request {
                    op: "PUT",
                    message: svc.to_string(),
                }
            })?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                op: "DELETE",
                message: e.to_string(),
            })?;
        Ok(())
    }
}
