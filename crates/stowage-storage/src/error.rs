use stowage_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("File name too long: {0}")]
    NameTooLong(String),

    #[error("No free name for {name} after {attempts} attempts")]
    NameExhausted { name: String, attempts: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::NameTooLong(msg) => AppError::InvalidInput(format!(
                "File name too long to store: {}",
                msg
            )),
            StorageError::NameExhausted { name, attempts } => {
                AppError::NameExhausted { name, attempts }
            }
            StorageError::UploadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::ConfigError(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Storage(format!("IO error: {}", err)),
        }
    }
}
