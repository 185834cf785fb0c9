//! Same-name conflict resolution.
//!
//! A size difference within the tolerance is treated as "the same file" and rejected.
//! A larger difference is a different file under the same name: it needs explicit
//! confirmation, after which the old file and record are removed before the new write.

use stowage_core::{AppError, FileRecord};
use stowage_db::FileRecordStore;
use stowage_storage::LocalStorage;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictDecision {
    Proceed,
    RejectDuplicate { existing: FileRecord },
    RequireConfirmation { existing: FileRecord, size_delta: i64 },
    ReplaceConfirmed { existing: FileRecord },
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    tolerance: i64,
}

impl ConflictResolver {
    pub fn new(tolerance: i64) -> Self {
        Self { tolerance }
    }

    /// Decide what to do with an upload given the record already holding its name.
    pub fn decide(
        &self,
        existing: Option<FileRecord>,
        new_size: i64,
        confirm_replace: bool,
    ) -> ConflictDecision {
        let Some(existing) = existing else {
            return ConflictDecision::Proceed;
        };

        let size_delta = (existing.size - new_size).abs();
        if size_delta <= self.tolerance {
            ConflictDecision::RejectDuplicate { existing }
        } else if !confirm_replace {
            ConflictDecision::RequireConfirmation {
                existing,
                size_delta,
            }
        } else {
            ConflictDecision::ReplaceConfirmed { existing }
        }
    }

    /// Look up the owner's record for `name` and decide.
    pub async fn resolve(
        &self,
        store: &dyn FileRecordStore,
        owner_id: Uuid,
        name: &str,
        new_size: i64,
        confirm_replace: bool,
    ) -> Result<ConflictDecision, AppError> {
        let existing = store.find_by_owner_and_name(owner_id, name).await?;
        Ok(self.decide(existing, new_size, confirm_replace))
    }

    /// Remove the file being replaced: physical file first (failure only logged), then
    /// its record. A failed record delete aborts the upload.
    pub async fn apply_replacement(
        &self,
        store: &dyn FileRecordStore,
        storage: &LocalStorage,
        existing: &FileRecord,
    ) -> Result<(), AppError> {
        storage.delete_best_effort(&existing.path).await;

        match store.delete(existing.owner_id, existing.id).await {
            Ok(_) => {
                tracing::info!(
                    owner_id = %existing.owner_id,
                    file_id = %existing.id,
                    file_name = %existing.name,
                    size_bytes = existing.size,
                    "Replaced file removed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    owner_id = %existing.owner_id,
                    file_id = %existing.id,
                    "Failed to delete replaced file record"
                );
                Err(AppError::MetadataPersistFailure(format!(
                    "failed to delete previous record for {}: {}",
                    existing.name, e
                )))
            }
        }
    }
}
