//! In-memory metadata store
//!
//! Implements every seam trait over maps behind a `tokio` lock. Used for dry runs and
//! tests; it enforces the same (owner, name) uniqueness as the database index and can be
//! told to fail the next create or delete.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use stowage_core::{AppError, FileRecord, NewFileRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{FileRecordStore, FolderLookup, QuotaLookup};

/// 1 GiB, matching the schema default for new owners
pub const DEFAULT_STORAGE_LIMIT: i64 = 1024 * 1024 * 1024;

#[derive(Default)]
struct State {
    files: HashMap<Uuid, FileRecord>,
    folders: HashSet<(Uuid, Uuid)>,
    limits: HashMap<Uuid, i64>,
}

#[derive(Clone)]
pub struct InMemoryMetadataStore {
    state: Arc<RwLock<State>>,
    default_limit: i64,
    fail_next_create: Arc<AtomicBool>,
    fail_next_delete: Arc<AtomicBool>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::with_default_limit(DEFAULT_STORAGE_LIMIT)
    }

    /// Owners without an explicit limit get `default_limit` bytes.
    pub fn with_default_limit(default_limit: i64) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            default_limit,
            fail_next_create: Arc::new(AtomicBool::new(false)),
            fail_next_delete: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn set_storage_limit(&self, owner_id: Uuid, limit: i64) {
        self.state.write().await.limits.insert(owner_id, limit);
    }

    pub async fn add_folder(&self, owner_id: Uuid, folder_id: Uuid) {
        self.state.write().await.folders.insert((owner_id, folder_id));
    }

    /// Insert a record directly, bypassing uniqueness checks.
    pub async fn insert(&self, record: FileRecord) {
        self.state.write().await.files.insert(record.id, record);
    }

    pub async fn file_count(&self, owner_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .count()
    }

    /// Make the next `create` call fail once.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Make the next `delete` call fail once.
    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileRecordStore for InMemoryMetadataStore {
    async fn find_by_owner_and_name(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .files
            .values()
            .find(|f| f.owner_id == owner_id && f.name == name)
            .cloned())
    }

    async fn total_size_by_owner(&self, owner_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.read().await;
        Ok(state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.size)
            .sum())
    }

    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal(
                "metadata store unavailable".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let taken = state
            .files
            .values()
            .any(|f| f.owner_id == record.owner_id && f.name == record.name);
        if taken {
            return Err(AppError::Internal(format!(
                "duplicate key value violates unique constraint files_owner_name_key: {}",
                record.name
            )));
        }

        let created = record.into_record();
        state.files.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal(
                "metadata store unavailable".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        match state.files.get(&id) {
            Some(f) if f.owner_id == owner_id => {
                state.files.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .files
            .get(&id)
            .filter(|f| f.owner_id == owner_id)
            .cloned())
    }

    async fn move_to_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Option<FileRecord>, AppError> {
        let mut state = self.state.write().await;
        Ok(match state.files.get_mut(&id) {
            Some(f) if f.owner_id == owner_id => {
                f.folder_id = folder_id;
                f.updated_at = Utc::now();
                Some(f.clone())
            }
            _ => None,
        })
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let state = self.state.read().await;
        let mut records: Vec<FileRecord> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .filter(|f| folder_id.is_none() || f.folder_id == folder_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[async_trait]
impl FolderLookup for InMemoryMetadataStore {
    async fn folder_exists(&self, owner_id: Uuid, folder_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .state
            .read()
            .await
            .folders
            .contains(&(owner_id, folder_id)))
    }
}

#[async_trait]
impl QuotaLookup for InMemoryMetadataStore {
    async fn storage_limit(&self, owner_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .state
            .read()
            .await
            .limits
            .get(&owner_id)
            .copied()
            .unwrap_or(self.default_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::FileType;

    fn new_record(owner_id: Uuid, name: &str, size: i64) -> NewFileRecord {
        NewFileRecord {
            owner_id,
            name: name.to_string(),
            size,
            file_type: FileType::from_filename(name),
            path: format!("{}/{}", FileType::from_filename(name), name),
            folder_id: None,
            thumbnail_data: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();

        let created = store.create(new_record(owner, "a.txt", 10)).await.unwrap();
        let found = store
            .find_by_owner_and_name(owner, "a.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        assert!(store
            .find_by_owner_and_name(Uuid::new_v4(), "a.txt")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unique_owner_name() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();

        store.create(new_record(owner, "a.txt", 10)).await.unwrap();
        assert!(store.create(new_record(owner, "a.txt", 99)).await.is_err());
        assert!(store
            .create(new_record(Uuid::new_v4(), "a.txt", 10))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_total_size_sums_owner_files() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();

        assert_eq!(store.total_size_by_owner(owner).await.unwrap(), 0);
        store.create(new_record(owner, "a.txt", 10)).await.unwrap();
        store.create(new_record(owner, "b.txt", 32)).await.unwrap();
        store
            .create(new_record(Uuid::new_v4(), "c.txt", 1000))
            .await
            .unwrap();

        assert_eq!(store.total_size_by_owner(owner).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_fail_next_create_is_one_shot() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();

        store.fail_next_create();
        assert!(store.create(new_record(owner, "a.txt", 1)).await.is_err());
        assert!(store.create(new_record(owner, "a.txt", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let created = store.create(new_record(owner, "a.txt", 1)).await.unwrap();

        assert!(!store.delete(Uuid::new_v4(), created.id).await.unwrap());
        assert!(store.delete(owner, created.id).await.unwrap());
        assert!(store.get(owner, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_limits_and_folders() {
        let store = InMemoryMetadataStore::with_default_limit(500);
        let owner = Uuid::new_v4();
        let folder = Uuid::new_v4();

        assert_eq!(store.storage_limit(owner).await.unwrap(), 500);
        store.set_storage_limit(owner, 100).await;
        assert_eq!(store.storage_limit(owner).await.unwrap(), 100);

        assert!(!store.folder_exists(owner, folder).await.unwrap());
        store.add_folder(owner, folder).await;
        assert!(store.folder_exists(owner, folder).await.unwrap());
        assert!(!store.folder_exists(Uuid::new_v4(), folder).await.unwrap());
    }
}
