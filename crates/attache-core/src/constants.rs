//! Application-wide constants.

/// Key prefix marking a pending (provisional) upload.
///
/// Promotion strips exactly this prefix to obtain the permanent key.
pub const DEFAULT_TEMP_PREFIX: &str = "temp/";

/// Default number of concurrent deletes issued by a batch cleanup.
pub const DEFAULT_CLEANUP_CONCURRENCY: usize = 8;

/// Default lifetime of presigned URLs, in seconds.
pub const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u64 = 3600;
