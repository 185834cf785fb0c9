//! Error types module
//!
//! This module provides the core error types used throughout Stowage.
//! All errors are unified under the `AppError` enum, which covers the upload pipeline's
//! failure taxonomy (admission, quota, validation, incomplete writes, metadata persistence,
//! name exhaustion) alongside the generic database/storage/internal failures.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
/// to whichever request layer sits in front of the pipeline.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "QUOTA_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried by the caller)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Upload capacity exhausted: {in_flight}/{capacity} uploads in flight")]
    AdmissionDenied { in_flight: usize, capacity: usize },

    #[error("Storage quota exceeded: {used} used + {incoming} incoming > {limit} limit")]
    QuotaExceeded { used: i64, incoming: i64, limit: i64 },

    #[error("Incomplete write: {0}")]
    IncompleteWrite(String),

    #[error("Failed to persist file record: {0}")]
    MetadataPersistFailure(String),

    #[error("Could not find a free name for {name} after {attempts} attempts")]
    NameExhausted { name: String, attempts: u32 },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
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
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::AdmissionDenied { .. } => (
            429,
            "ADMISSION_DENIED",
            true,
            Some("Server busy, retry shortly"),
            false,
            LogLevel::Warn,
        ),
        AppError::QuotaExceeded { .. } => (
            400,
            "QUOTA_EXCEEDED",
            false,
            Some("Free up space or ask for a larger storage limit"),
            false,
            LogLevel::Debug,
        ),
        AppError::IncompleteWrite(_) => (
            500,
            "INCOMPLETE_WRITE",
            true,
            Some("Upload the file again"),
            true,
            LogLevel::Warn,
        ),
        AppError::MetadataPersistFailure(_) => (
            500,
            "METADATA_PERSIST_FAILURE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::NameExhausted { .. } => (
            500,
            "NAME_EXHAUSTED",
            false,
            Some("Rename the file and upload again"),
            false,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
            AppError::AdmissionDenied { .. } => "AdmissionDenied",
            AppError::QuotaExceeded { .. } => "QuotaExceeded",
            AppError::IncompleteWrite(_) => "IncompleteWrite",
            AppError::MetadataPersistFailure(_) => "MetadataPersistFailure",
            AppError::NameExhausted { .. } => "NameExhausted",
        }
    }

    /// True for errors the caller caused by sending a bad request (empty file, size cap, bad name).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_) | AppError::PayloadTooLarge(_)
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::AdmissionDenied { .. } => {
                "Server busy, please retry later".to_string()
            }
            AppError::QuotaExceeded {
                used,
                incoming,
                limit,
            } => format!(
                "Insufficient storage space: {} bytes used, {} bytes requested, {} bytes allowed",
                used, incoming, limit
            ),
            AppError::IncompleteWrite(_) => "File write was incomplete".to_string(),
            AppError::MetadataPersistFailure(_) => "Failed to save file record".to_string(),
            AppError::NameExhausted { name, .. } => {
                format!("Unable to generate a unique file name for {}", name)
            }
        }
    }
}
