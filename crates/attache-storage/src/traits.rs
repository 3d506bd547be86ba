//! The storage collaborator the promotion engine works against.

use crate::keys;
use crate::{ObjectInfo, StorageBackend};
use async_trait::async_trait;
use attache_core::constants::DEFAULT_CLEANUP_CONCURRENCY;
use attache_core::AppError;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::ConfigError(msg) => AppError::Config(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object storage keyed by relative paths.
///
/// Implemented by the S3 and filesystem backends. The promotion engine only
/// relies on [`Storage::promote`], [`Storage::delete`] and
/// [`Storage::delete_batch`]; the remaining operations serve uploads and tooling.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `storage_key` and return its public URL.
    async fn put(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Read the whole object.
    async fn get(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Fetch object metadata without downloading the body.
    async fn head(&self, storage_key: &str) -> StorageResult<ObjectInfo>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Copy a file from one key to another, returning the destination URL.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String>;

    /// Delete a file by its storage key. Deleting a missing key succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Time-limited download URL.
    async fn presigned_get_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Time-limited upload URL, used to drop files under the temp prefix.
    /// Backends that cannot sign uploads return `ConfigError`.
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    fn backend_type(&self) -> StorageBackend;

    /// Prefix marking pending uploads on this backend.
    fn temp_prefix(&self) -> &str;

    /// Maximum number of deletes `delete_batch` keeps in flight.
    fn batch_concurrency(&self) -> usize {
        DEFAULT_CLEANUP_CONCURRENCY
    }

    /// Move a pending upload to its permanent key.
    ///
    /// Keys without the temp prefix are returned unchanged without any I/O.
    /// Otherwise the object is copied to the key with the prefix stripped and the
    /// temp object is removed. A failure to remove the temp object is logged; the
    /// permanent object exists at that point, so the promotion still succeeds.
    async fn promote(&self, storage_key: &str) -> StorageResult<String> {
        let Some(permanent) = keys::strip_temp_prefix(storage_key, self.temp_prefix()) else {
            return Ok(storage_key.to_string());
        };
        let permanent = permanent.to_string();
        keys::validate_key(&permanent)?;

        self.copy(storage_key, &permanent).await?;

        if let Err(e) = self.delete(storage_key).await {
            tracing::warn!(
                error = %e,
                key = %storage_key,
                new_key = %permanent,
                "Promoted file but failed to remove temp object"
            );
        }

        Ok(permanent)
    }

    /// Delete several keys with bounded concurrency.
    ///
    /// Every key is attempted; the result reports the first failure.
    async fn delete_batch(&self, storage_keys: &[String]) -> StorageResult<()> {
        if storage_keys.is_empty() {
            return Ok(());
        }

        let concurrency = self.batch_concurrency().max(1);
        // Futures are built up front; mapping inside the stream would tie the
        // closure to one borrow lifetime, which the Send bound rejects.
        let deletes: Vec<_> = storage_keys.iter().map(|key| self.delete(key)).collect();
        let results: Vec<StorageResult<()>> = stream::iter(deletes)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let total = results.len();
        let mut errors = results.into_iter().filter_map(Result::err);
        match errors.next() {
            None => Ok(()),
            Some(first) => {
                let failed = 1 + errors.count();
                Err(StorageError::DeleteFailed(format!(
                    "{} of {} deletes failed; first error: {}",
                    failed, total, first
                )))
            }
        }
    }
}
