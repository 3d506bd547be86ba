use attache_core::AppError;
use attache_storage::StorageError;
use thiserror::Error;

/// Errors returned by the promotion engine.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// A temp reference could not be moved to its permanent key. Work stops
    /// at the first such failure.
    #[error("Failed to promote '{key}' in field '{field}': {source}")]
    Promote {
        field: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid annotation on field '{field}': {reason}")]
    InvalidAnnotation { field: String, reason: String },
}

impl PromotionError {
    /// The temp key whose promotion failed, if any.
    pub fn failed_key(&self) -> Option<&str> {
        match self {
            PromotionError::Promote { key, .. } => Some(key),
            PromotionError::InvalidAnnotation { .. } => None,
        }
    }
}

impl From<PromotionError> for AppError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::Promote { .. } => AppError::Promotion(err.to_string()),
            PromotionError::InvalidAnnotation { .. } => AppError::InvalidInput(err.to_string()),
        }
    }
}
