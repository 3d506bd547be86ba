//! Attache CLI: inspect content bodies and operate on the configured storage.
//!
//! Storage commands read their settings from the environment (a `.env` file is
//! honoured): STORAGE_BACKEND, S3_BUCKET, S3_REGION, LOCAL_STORAGE_PATH, ...

use anyhow::Context;
use attache_cli::{init_tracing, parse_mapping, read_body, report_error, upload_temp};
use attache_content::ContentFormat;
use attache_core::{AppError, Config, LogFormat};
use attache_storage::create_storage;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "attache", about = "Storage reference promotion tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the relative URLs referenced by an HTML or Markdown body
    Extract {
        /// Body dialect: html or markdown
        #[arg(long, default_value = "html")]
        format: ContentFormat,
        /// File to scan, or - for stdin
        file: PathBuf,
    },
    /// Rewrite URLs in an HTML or Markdown body
    Rewrite {
        /// Body dialect: html or markdown
        #[arg(long, default_value = "html")]
        format: ContentFormat,
        /// File to rewrite, or - for stdin
        file: PathBuf,
        /// Replacement as old=new; may be repeated
        #[arg(long = "map", value_name = "OLD=NEW")]
        mappings: Vec<String>,
    },
    /// Promote temp keys to their permanent location
    Promote {
        /// Storage keys; keys outside the temp prefix are left as they are
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Store a file as a pending upload under the temp prefix
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Permanent key the upload promotes to
        key: String,
        /// MIME type recorded with the object
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
    /// Show object metadata
    Head {
        /// Storage key
        key: String,
    },
    /// Generate a presigned download URL
    Presign {
        /// Storage key
        key: String,
        /// Lifetime in seconds (defaults to PRESIGNED_URL_EXPIRY_SECS)
        #[arg(long)]
        expires_in: Option<u64>,
    },
}

#[derive(Serialize)]
struct PromotedKey {
    key: String,
    new_key: String,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn load_config() -> Result<Config, AppError> {
    Config::from_env().map_err(|e| AppError::Config(format!("{:#}", e)))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_value(
        std::env::var("LOG_FORMAT").ok().as_deref(),
    ));

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", report_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Extract { format, file } => {
            let body = read_body(&file)?;
            let urls = attache_content::extract_urls(format, &body);
            print_json(&urls)?;
        }
        Commands::Rewrite {
            format,
            file,
            mappings,
        } => {
            let body = read_body(&file)?;
            let mapping = parse_mapping(&mappings)
                .map_err(|e| AppError::InvalidInput(format!("{:#}", e)))?;
            print!("{}", attache_content::rewrite_urls(format, &body, &mapping));
        }
        Commands::Promote { keys } => {
            let config = load_config()?;
            let storage = create_storage(&config).await?;

            let mut promoted = Vec::with_capacity(keys.len());
            for key in keys {
                let new_key = storage.promote(&key).await.map_err(|e| {
                    AppError::Promotion(format!("Failed to promote {}: {}", key, e))
                })?;
                tracing::debug!(key = %key, new_key = %new_key, "Promoted");
                promoted.push(PromotedKey { key, new_key });
            }
            print_json(&promoted)?;
        }
        Commands::Upload {
            file,
            key,
            content_type,
        } => {
            let data = std::fs::read(&file)?;
            let config = load_config()?;
            let storage = create_storage(&config).await?;
            let upload = upload_temp(storage.as_ref(), &key, data, &content_type).await?;
            print_json(&upload)?;
        }
        Commands::Head { key } => {
            let config = load_config()?;
            let storage = create_storage(&config).await?;
            let info = storage.head(&key).await?;
            print_json(&info)?;
        }
        Commands::Presign { key, expires_in } => {
            let config = load_config()?;
            let storage = create_storage(&config).await?;
            let expires_in =
                Duration::from_secs(expires_in.unwrap_or(config.presigned_url_expiry_secs));
            let url = storage.presigned_get_url(&key, expires_in).await?;
            print_json(&serde_json::json!({ "key": key, "url": url }))?;
        }
    }

    Ok(())
}
