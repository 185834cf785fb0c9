//! Stowage Storage Library
//!
//! Local filesystem storage for uploaded files.
//!
//! # Storage key format
//!
//! Keys are relative to the storage root and grouped by file type:
//! `{file_type}/{unique_name}`, e.g. `video/holiday_1.mp4`.
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module.

mod error;
pub mod keys;
pub mod local;
pub mod naming;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use local::{CreatedFile, LocalStorage};
pub use naming::UniqueNamer;
