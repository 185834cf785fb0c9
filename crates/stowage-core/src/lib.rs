//! Stowage Core Library
//!
//! This crate provides core domain models, error types, configuration, and validation
//! that are shared across all Stowage components.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{DeploymentTier, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileRecord, FileType, NewFileRecord, StorageInfo};
