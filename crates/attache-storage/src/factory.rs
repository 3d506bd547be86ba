#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use attache_core::Config;
use std::sync::Arc;

/// A setting the selected backend cannot run without.
#[allow(dead_code)]
fn required<'a>(value: Option<&'a str>, name: &str) -> StorageResult<String> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StorageError::ConfigError(format!("{} must be set", name)))
}

/// Build the backend selected by `STORAGE_BACKEND`, with the configured temp
/// prefix and cleanup concurrency applied.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend;
    let storage: Arc<dyn Storage> = match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = required(config.s3_bucket(), "S3_BUCKET")?;
            let region = required(config.s3_region(), "S3_REGION (or AWS_REGION)")?;
            let endpoint = config.s3_endpoint().map(str::to_string);
            Arc::new(
                S3Storage::new(bucket, region, endpoint)
                    .await?
                    .with_temp_prefix(config.temp_prefix())
                    .with_batch_concurrency(config.cleanup_concurrency),
            )
        }

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let root = required(config.local_storage_path(), "LOCAL_STORAGE_PATH")?;
            let public_url = required(config.local_storage_base_url(), "LOCAL_STORAGE_BASE_URL")?;
            Arc::new(
                LocalStorage::new(root, public_url)
                    .await?
                    .with_temp_prefix(config.temp_prefix())
                    .with_batch_concurrency(config.cleanup_concurrency),
            )
        }

        #[allow(unreachable_patterns)]
        other => {
            return Err(StorageError::ConfigError(format!(
                "{} backend is not compiled into this build",
                other
            )))
        }
    };

    tracing::info!(
        backend = %backend,
        temp_prefix = %storage.temp_prefix(),
        "Storage backend ready"
    );
    Ok(storage)
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_create_local_storage_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = [
            ("STORAGE_BACKEND", "local".to_string()),
            ("LOCAL_STORAGE_PATH", dir.path().display().to_string()),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost:3000/files".to_string()),
            ("TEMP_PREFIX", "pending/".to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_vars(|name| vars.get(name).cloned()).unwrap();

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert_eq!(storage.temp_prefix(), "pending/");
    }

    #[tokio::test]
    async fn test_missing_local_path_is_config_error() {
        let vars: HashMap<&str, String> = [
            ("STORAGE_BACKEND", "local".to_string()),
            ("LOCAL_STORAGE_PATH", "/srv/files".to_string()),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost:3000/files".to_string()),
        ]
        .into_iter()
        .collect();
        let mut config = Config::from_vars(|name| vars.get(name).cloned()).unwrap();
        config.local_storage_path = None;

        match create_storage(&config).await {
            Err(StorageError::ConfigError(msg)) => assert!(msg.contains("LOCAL_STORAGE_PATH")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("storage created without a root path"),
        }
    }
}
