//! Attache Storage Library
//!
//! This crate provides the storage collaborator used by the promotion engine:
//! the [`Storage`] trait and implementations for S3 and the local filesystem.
//!
//! # Storage key format
//!
//! Keys are opaque, slash-separated object names. A key that starts with the
//! configured temp prefix (`temp/` by default) is a pending upload; promoting it
//! moves the object to the same key with exactly that prefix removed:
//!
//! - `temp/users/42/avatar.jpg` promotes to `users/42/avatar.jpg`
//! - `users/42/avatar.jpg` is already permanent and promotes to itself
//!
//! Keys must not contain `..` or a leading `/`. Key helpers live in the
//! [`keys`] module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use attache_core::{ObjectInfo, StorageBackend};
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
