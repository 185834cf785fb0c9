//! Per-owner storage quota.
//!
//! Usage is always summed from metadata at check time. The check is read-then-act: two
//! concurrent uploads for one owner may both pass and jointly exceed the limit.

use std::sync::Arc;

use stowage_core::{AppError, StorageInfo};
use stowage_db::{FileRecordStore, QuotaLookup};
use uuid::Uuid;

#[derive(Clone)]
pub struct QuotaGuard {
    files: Arc<dyn FileRecordStore>,
    limits: Arc<dyn QuotaLookup>,
}

impl QuotaGuard {
    pub fn new(files: Arc<dyn FileRecordStore>, limits: Arc<dyn QuotaLookup>) -> Self {
        Self { files, limits }
    }

    pub async fn storage_info(&self, owner_id: Uuid) -> Result<StorageInfo, AppError> {
        let used = self.files.total_size_by_owner(owner_id).await?;
        let limit = self.limits.storage_limit(owner_id).await?;
        Ok(StorageInfo::new(used, limit))
    }

    /// Fail with `QuotaExceeded` unless `used + incoming <= limit`.
    pub async fn check(&self, owner_id: Uuid, incoming: i64) -> Result<StorageInfo, AppError> {
        let info = self.storage_info(owner_id).await?;

        if info.used_space.saturating_add(incoming) > info.total_space {
            tracing::warn!(
                owner_id = %owner_id,
                used_bytes = info.used_space,
                incoming_bytes = incoming,
                limit_bytes = info.total_space,
                "Storage quota exceeded"
            );
            return Err(AppError::QuotaExceeded {
                used: info.used_space,
                incoming,
                limit: info.total_space,
            });
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{FileType, NewFileRecord};
    use stowage_db::InMemoryMetadataStore;

    async fn guard_with_usage(used: i64, limit: i64) -> (QuotaGuard, Uuid) {
        let store = Arc::new(InMemoryMetadataStore::new());
        let owner = Uuid::new_v4();
        store.set_storage_limit(owner, limit).await;
        if used > 0 {
            store
                .create(NewFileRecord {
                    owner_id: owner,
                    name: "existing.bin".to_string(),
                    size: used,
                    file_type: FileType::Other,
                    path: "other/existing.bin".to_string(),
                    folder_id: None,
                    thumbnail_data: None,
                })
                .await
                .unwrap();
        }
        (QuotaGuard::new(store.clone(), store), owner)
    }

    #[tokio::test]
    async fn test_full_quota_rejects_one_byte() {
        let (guard, owner) = guard_with_usage(100, 100).await;

        let err = guard.check(owner, 1).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::QuotaExceeded {
                used: 100,
                incoming: 1,
                limit: 100
            }
        ));
    }

    #[tokio::test]
    async fn test_exact_fit_is_allowed() {
        let (guard, owner) = guard_with_usage(60, 100).await;

        let info = guard.check(owner, 40).await.unwrap();
        assert_eq!(info.used_space, 60);
        assert_eq!(info.usage_percent, 60);
        assert!(guard.check(owner, 41).await.is_err());
    }
}
