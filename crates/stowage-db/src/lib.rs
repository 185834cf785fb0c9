//! Stowage Database Layer
//!
//! This crate provides the metadata-store seam used by the upload pipeline and its
//! implementations: PostgreSQL repositories backed by `sqlx`, and an in-memory store
//! used by tests and dry runs.

// Module declarations
pub mod db;
pub mod memory;
pub mod traits;

// Re-exports: PostgreSQL repositories
pub use db::{PgFileRepository, PgFolderRepository, PgOwnerRepository};

// Re-exports: In-memory store
pub use memory::InMemoryMetadataStore;

// Re-exports: Seam traits
pub use traits::{FileRecordStore, FolderLookup, QuotaLookup};
