//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is honoured) with typed
//! defaults, then validated against the selected storage backend.

use std::env;

use crate::constants::{
    DEFAULT_CLEANUP_CONCURRENCY, DEFAULT_PRESIGNED_URL_EXPIRY_SECS, DEFAULT_TEMP_PREFIX,
};
use crate::storage_types::StorageBackend;

/// Output format of the tracing subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value; anything but `json` selects the pretty format.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub log_format: LogFormat,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Promotion behaviour
    pub temp_prefix: String,
    pub cleanup_concurrency: usize,
    pub presigned_url_expiry_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(s) => s.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let log_format = LogFormat::from_value(var("LOG_FORMAT").as_deref());

        let config = Config {
            environment,
            log_format,
            storage_backend,
            s3_bucket: var("S3_BUCKET").filter(|s| !s.is_empty()),
            s3_region: var("S3_REGION").filter(|s| !s.is_empty()),
            s3_endpoint: var("S3_ENDPOINT").filter(|s| !s.is_empty()),
            aws_region: var("AWS_REGION").filter(|s| !s.is_empty()),
            local_storage_path: var("LOCAL_STORAGE_PATH").filter(|s| !s.is_empty()),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL").filter(|s| !s.is_empty()),
            temp_prefix: var("TEMP_PREFIX").unwrap_or_else(|| DEFAULT_TEMP_PREFIX.to_string()),
            cleanup_concurrency: var("CLEANUP_CONCURRENCY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CLEANUP_CONCURRENCY),
            presigned_url_expiry_secs: var("PRESIGNED_URL_EXPIRY_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PRESIGNED_URL_EXPIRY_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_temp_prefix(&self.temp_prefix)?;

        if self.cleanup_concurrency == 0 {
            return Err(anyhow::anyhow!("CLEANUP_CONCURRENCY must be at least 1"));
        }

        let required: [(&str, bool); 2] = match self.storage_backend {
            StorageBackend::S3 => [
                ("S3_BUCKET", self.s3_bucket.is_some()),
                (
                    "S3_REGION or AWS_REGION",
                    self.s3_region.is_some() || self.aws_region.is_some(),
                ),
            ],
            StorageBackend::Local => [
                ("LOCAL_STORAGE_PATH", self.local_storage_path.is_some()),
                ("LOCAL_STORAGE_BASE_URL", self.local_storage_base_url.is_some()),
            ],
        };
        if let Some((name, _)) = required.iter().find(|(_, present)| !present) {
            anyhow::bail!(
                "{} must be set for the {} storage backend",
                name,
                self.storage_backend
            );
        }

        Ok(())
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    /// S3 region, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.local_storage_base_url.as_deref()
    }

    pub fn temp_prefix(&self) -> &str {
        &self.temp_prefix
    }
}

/// A temp prefix must be a non-empty relative directory segment such as `temp/`.
pub fn validate_temp_prefix(prefix: &str) -> Result<(), anyhow::Error> {
    if prefix.is_empty() {
        return Err(anyhow::anyhow!("TEMP_PREFIX cannot be empty"));
    }
    if !prefix.ends_with('/') {
        return Err(anyhow::anyhow!(
            "TEMP_PREFIX '{}' must end with '/'",
            prefix
        ));
    }
    if prefix.starts_with('/') || prefix.contains("..") {
        return Err(anyhow::anyhow!(
            "TEMP_PREFIX '{}' must be a relative path without '..'",
            prefix
        ));
    }
    Ok(())
}
