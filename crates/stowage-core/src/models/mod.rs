//! Data models for the application
//!
//! File records, their type classification and per-owner storage usage.

mod file;
mod storage;

pub use file::*;
pub use storage::*;
