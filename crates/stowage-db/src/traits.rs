//! Repository trait abstractions
//!
//! These traits define the minimal interface the upload pipeline needs from the metadata
//! store, so the pipeline can run against PostgreSQL or the in-memory store alike.

use async_trait::async_trait;
use stowage_core::{AppError, FileRecord, NewFileRecord};
use uuid::Uuid;

/// File record operations
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    /// Get the live record for (owner, name), if any
    async fn find_by_owner_and_name(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Sum of sizes of all files the owner has stored
    async fn total_size_by_owner(&self, owner_id: Uuid) -> Result<i64, AppError>;

    /// Insert a record. Fails if (owner, name) is already taken.
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError>;

    /// Delete a record. Returns false when nothing was deleted.
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    /// Set or clear the parent folder. Returns the updated record, or None if not found.
    async fn move_to_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Files of an owner, newest first, optionally restricted to one folder
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError>;
}

/// Folder existence check
#[async_trait]
pub trait FolderLookup: Send + Sync {
    async fn folder_exists(&self, owner_id: Uuid, folder_id: Uuid) -> Result<bool, AppError>;
}

/// Owner storage-limit lookup
#[async_trait]
pub trait QuotaLookup: Send + Sync {
    /// Storage limit in bytes
    async fn storage_limit(&self, owner_id: Uuid) -> Result<i64, AppError>;
}
