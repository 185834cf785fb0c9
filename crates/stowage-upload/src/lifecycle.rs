//! Operations on stored files: delete, move, listing and storage usage.

use stowage_core::{AppError, FileRecord, StorageInfo};
use uuid::Uuid;

use crate::service::UploadService;

impl UploadService {
    /// Delete a file. The physical file is removed best-effort; the record is always
    /// removed.
    #[tracing::instrument(skip(self), fields(owner_id = %owner_id, file_id = %file_id))]
    pub async fn delete(&self, owner_id: Uuid, file_id: Uuid) -> Result<FileRecord, AppError> {
        let record = self
            .files
            .get(owner_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))?;

        self.storage.delete_best_effort(&record.path).await;
        self.files.delete(owner_id, file_id).await?;

        tracing::info!(
            file_name = %record.name,
            path = %record.path,
            size_bytes = record.size,
            "File deleted"
        );

        Ok(record)
    }

    /// Move a file into a folder, or to the root with `None`.
    #[tracing::instrument(skip(self), fields(owner_id = %owner_id, file_id = %file_id))]
    pub async fn move_to_folder(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<FileRecord, AppError> {
        if self.files.get(owner_id, file_id).await?.is_none() {
            return Err(AppError::NotFound(format!("File {} not found", file_id)));
        }

        if let Some(fid) = folder_id {
            if !self.folders.folder_exists(owner_id, fid).await? {
                return Err(AppError::InvalidInput(format!(
                    "Target folder {} does not exist",
                    fid
                )));
            }
        }

        let record = self
            .files
            .move_to_folder(owner_id, file_id, folder_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))?;

        tracing::info!(folder_id = ?folder_id, "File moved");
        Ok(record)
    }

    pub async fn storage_info(&self, owner_id: Uuid) -> Result<StorageInfo, AppError> {
        self.quota.storage_info(owner_id).await
    }

    /// Files of an owner, newest first, optionally restricted to one folder.
    pub async fn list_files(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.files.list_by_owner(owner_id, folder_id).await
    }
}
