//! Attache Core Library
//!
//! This crate provides the configuration, error types and shared models used by
//! every Attache component: the storage collaborator, the content scanners and
//! the promotion engine.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FieldAttrs, FileEvent, FileOperation, ObjectInfo};
pub use storage_types::StorageBackend;
