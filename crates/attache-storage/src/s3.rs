//! S3 backend on top of `object_store`, for AWS and S3-compatible providers.

use crate::traits::{Storage, StorageError, StorageResult};
use crate::{ObjectInfo, StorageBackend};
use async_trait::async_trait;
use attache_core::constants::{DEFAULT_CLEANUP_CONCURRENCY, DEFAULT_TEMP_PREFIX};
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    /// URL prefix objects are publicly reachable under, without trailing slash.
    public_base: String,
    temp_prefix: String,
    batch_concurrency: usize,
}

fn location(storage_key: &str) -> Path {
    Path::from(storage_key.to_string())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl S3Storage {
    /// Connect to `bucket`. With `endpoint_url` set (MinIO, R2, ...) URLs are
    /// path-style on that endpoint; otherwise virtual-hosted AWS URLs are used.
    /// Credentials come from the usual `AWS_*` variables.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.as_str())
            .with_bucket_name(bucket.as_str());

        let public_base = match endpoint_url.as_deref() {
            Some(endpoint) => {
                builder = builder
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"));
                format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
            }
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        };

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(format!("S3 client for {}: {}", bucket, e)))?;

        Ok(S3Storage {
            store,
            bucket,
            public_base,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            batch_concurrency: DEFAULT_CLEANUP_CONCURRENCY,
        })
    }

    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    fn url_for(&self, storage_key: &str) -> String {
        format!("{}/{}", self.public_base, storage_key)
    }

    async fn signed_url(
        &self,
        method: Method,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let signed: ObjectResult<_> = self
            .store
            .signed_url(method, &location(storage_key), expires_in)
            .await;
        signed
            .map(|url| url.to_string())
            .map_err(|e| StorageError::BackendError(format!("Signing {}: {}", storage_key, e)))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let size = data.len();
        let start = Instant::now();
        let payload = PutPayload::from(Bytes::from(data));

        let stored: ObjectResult<_> = self.store.put(&location(storage_key), payload).await;
        if let Err(e) = stored {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                "Object upload failed"
            );
            return Err(StorageError::UploadFailed(e.to_string()));
        }

        tracing::debug!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = elapsed_ms(start),
            "Uploaded object"
        );
        Ok(self.url_for(storage_key))
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let fetched: ObjectResult<_> = self.store.get(&location(storage_key)).await;
        let body = match fetched {
            Ok(body) => body,
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => return Err(StorageError::DownloadFailed(e.to_string())),
        };

        let bytes = body
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn head(&self, storage_key: &str) -> StorageResult<ObjectInfo> {
        let meta = self
            .store
            .head(&location(storage_key))
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
                other => StorageError::BackendError(other.to_string()),
            })?;

        Ok(ObjectInfo {
            bucket: self.bucket.clone(),
            key: storage_key.to_string(),
            etag: meta.e_tag,
            size: meta.size as u64,
            content_type: None,
            last_modified: Some(meta.last_modified),
            metadata: HashMap::new(),
        })
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        match self.head(storage_key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        let start = Instant::now();
        let copied: ObjectResult<_> = self
            .store
            .copy(&location(from_key), &location(to_key))
            .await;
        copied.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(from_key.to_string()),
            other => StorageError::BackendError(format!("Copy {} -> {}: {}", from_key, to_key, other)),
        })?;

        tracing::debug!(
            bucket = %self.bucket,
            from_key = %from_key,
            to_key = %to_key,
            duration_ms = elapsed_ms(start),
            "Copied object"
        );
        Ok(self.url_for(to_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let removed: ObjectResult<_> = self.store.delete(&location(storage_key)).await;
        match removed {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::debug!(bucket = %self.bucket, key = %storage_key, "Removed object");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "Object delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn presigned_get_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.signed_url(Method::GET, storage_key, expires_in).await
    }

    async fn presigned_put_url(
        &self,
        storage_key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.signed_url(Method::PUT, storage_key, expires_in).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    fn temp_prefix(&self) -> &str {
        &self.temp_prefix
    }

    fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }
}
