//! Application-wide error type.
//!
//! Crate-specific errors (`StorageError`, `PromotionError`) fold into
//! [`AppError`], so the edges of the system (the CLI, host applications)
//! handle and report a single type through [`ErrorMetadata`].

use std::io;

/// Severity an error should be logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Caller mistakes: bad keys, malformed mappings.
    Debug,
    Warn,
    /// Backend and configuration failures.
    Error,
}

/// Reporting hints attached to an error.
pub trait ErrorMetadata {
    /// Stable machine-readable code, e.g. `PROMOTION_FAILED`.
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same operation may succeed.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show to whoever triggered the operation.
    fn client_message(&self) -> String;

    /// Whether the message carries backend details that should stay in logs.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Promotion failed: {0}")]
    Promotion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            _ => AppError::Internal(format!("I/O failure: {}", err)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("Malformed JSON: {}", err))
    }
}

/// Reporting profile of one error kind.
struct Profile {
    code: &'static str,
    recoverable: bool,
    action: Option<&'static str>,
    sensitive: bool,
    level: LogLevel,
}

const STORAGE: Profile = Profile {
    code: "STORAGE_ERROR",
    recoverable: true,
    action: Some("Retry once the storage backend is reachable"),
    sensitive: true,
    level: LogLevel::Error,
};

const PROMOTION: Profile = Profile {
    code: "PROMOTION_FAILED",
    recoverable: true,
    action: Some("Verify the temporary upload still exists and retry"),
    sensitive: false,
    level: LogLevel::Error,
};

const INVALID_INPUT: Profile = Profile {
    code: "INVALID_INPUT",
    recoverable: false,
    action: Some("Correct the input and try again"),
    sensitive: false,
    level: LogLevel::Debug,
};

const NOT_FOUND: Profile = Profile {
    code: "NOT_FOUND",
    recoverable: false,
    action: Some("Verify the storage key exists"),
    sensitive: false,
    level: LogLevel::Warn,
};

const CONFIG: Profile = Profile {
    code: "CONFIG_ERROR",
    recoverable: false,
    action: Some("Check the environment configuration"),
    sensitive: false,
    level: LogLevel::Error,
};

const INTERNAL: Profile = Profile {
    code: "INTERNAL_ERROR",
    recoverable: true,
    action: None,
    sensitive: true,
    level: LogLevel::Error,
};

impl AppError {
    fn profile(&self) -> &'static Profile {
        match self {
            AppError::Storage(_) => &STORAGE,
            AppError::Promotion(_) => &PROMOTION,
            AppError::InvalidInput(_) => &INVALID_INPUT,
            AppError::NotFound(_) => &NOT_FOUND,
            AppError::Config(_) => &CONFIG,
            AppError::Internal(_) | AppError::InternalWithSource { .. } => &INTERNAL,
        }
    }

    /// The error followed by its `source()` chain, one cause per line.
    pub fn chain(&self) -> String {
        use std::error::Error;

        let mut out = self.to_string();
        let mut cause = self.source();
        for _ in 0..8 {
            let Some(err) = cause else {
                break;
            };
            out.push_str("\n  caused by: ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        self.profile().code
    }

    fn is_recoverable(&self) -> bool {
        self.profile().recoverable
    }

    fn suggested_action(&self) -> Option<&'static str> {
        self.profile().action
    }

    fn is_sensitive(&self) -> bool {
        self.profile().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.profile().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Storage backend unavailable".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Unexpected internal error".to_string()
            }
            AppError::Promotion(msg)
            | AppError::InvalidInput(msg)
            | AppError::NotFound(msg)
            | AppError::Config(msg) => msg.clone(),
        }
    }
}
