//! Shared key helpers for storage backends.
//!
//! A temp key is any key that starts with the temp prefix; its permanent form is
//! the key with exactly that prefix removed.

use crate::traits::{StorageError, StorageResult};

/// Whether `key` denotes a pending upload under `prefix`.
pub fn is_temp_key(key: &str, prefix: &str) -> bool {
    !prefix.is_empty() && key.starts_with(prefix)
}

/// The permanent key for a temp key, or `None` if `key` is not under `prefix`.
pub fn strip_temp_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    key.strip_prefix(prefix)
}

/// Build the temp key that will later promote to `permanent_key`.
pub fn temp_key_for(prefix: &str, permanent_key: &str) -> String {
    format!("{}{}", prefix, permanent_key.trim_start_matches('/'))
}

/// Reject keys that are empty or could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key '{}' contains invalid characters",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_removes_exactly_the_prefix() {
        assert_eq!(
            strip_temp_prefix("temp/a/temp/doc1.pdf", "temp/"),
            Some("a/temp/doc1.pdf")
        );
        assert_eq!(strip_temp_prefix("a/doc1.pdf", "temp/"), None);
        assert_eq!(strip_temp_prefix("temporary/doc1.pdf", "temp/"), None);
        assert_eq!(strip_temp_prefix("temp/x", ""), None);
    }

    #[test]
    fn test_is_temp_key() {
        assert!(is_temp_key("temp/a.jpg", "temp/"));
        assert!(!is_temp_key("TEMP/a.jpg", "temp/"));
        assert!(!is_temp_key("a.jpg", "temp/"));
    }

    #[test]
    fn test_temp_key_for() {
        assert_eq!(temp_key_for("temp/", "users/1/a.jpg"), "temp/users/1/a.jpg");
        assert_eq!(temp_key_for("temp/", "/users/1/a.jpg"), "temp/users/1/a.jpg");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("users/1/a.jpg").is_ok());
        assert!(matches!(validate_key(""), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("  "), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("../etc/passwd"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("/etc/passwd"), Err(StorageError::InvalidKey(_))));
    }
}
