use anyhow::Context;
use attache_storage::{keys, Storage, StorageResult};
use serde::Serialize;
use attache_core::{AppError, ErrorMetadata, LogFormat, LogLevel};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays parseable.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Log a failed command at its level and render the line shown to the user.
pub fn report_error(err: &AppError) -> String {
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(code, error = %err.chain(), "Command failed"),
        LogLevel::Warn => tracing::warn!(code, error = %err.chain(), "Command failed"),
        LogLevel::Error => tracing::error!(code, error = %err.chain(), "Command failed"),
    }

    let mut line = format!("error[{}]: {}", code, err.client_message());
    if let Some(action) = err.suggested_action() {
        line.push_str(" (");
        line.push_str(action);
        line.push(')');
    }
    line
}

/// A file placed under the temp prefix, waiting for its record to be saved.
#[derive(Debug, Serialize)]
pub struct TempUpload {
    pub temp_key: String,
    /// Key the upload will have once promoted.
    pub key: String,
    pub url: String,
}

/// Store `data` as a pending upload that promotes to `key`.
pub async fn upload_temp(
    storage: &dyn Storage,
    key: &str,
    data: Vec<u8>,
    content_type: &str,
) -> StorageResult<TempUpload> {
    keys::validate_key(key)?;
    let temp_key = keys::temp_key_for(storage.temp_prefix(), key);
    let url = storage.put(&temp_key, data, content_type).await?;
    tracing::debug!(temp_key = %temp_key, key = %key, "Uploaded pending file");
    Ok(TempUpload {
        temp_key,
        key: key.to_string(),
        url,
    })
}

/// Parse `old=new` pairs into a rewrite mapping.
pub fn parse_mapping(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut mapping = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let (old, new) = pair
            .split_once('=')
            .with_context(|| format!("Mapping '{}' must look like old=new", pair))?;
        if old.is_empty() {
            anyhow::bail!("Mapping '{}' has an empty source URL", pair);
        }
        mapping.insert(old.to_string(), new.to_string());
    }
    Ok(mapping)
}

/// Read a body from `path`, or from stdin when `path` is `-`.
pub fn read_body(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Read body from stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(path).with_context(|| format!("Read {}", path.display()))
}
