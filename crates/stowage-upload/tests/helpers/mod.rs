//! Test helpers: build an UploadService over the in-memory store and a temp directory.
//!
//! Run from workspace root: `cargo test -p stowage-upload`.

#![allow(dead_code)]

use std::sync::Arc;

use stowage_core::{DeploymentTier, UploadConfig};
use stowage_db::InMemoryMetadataStore;
use stowage_storage::{LocalStorage, UniqueNamer};
use stowage_upload::{BatchEntry, SingleUpload, UploadService};
use tempfile::TempDir;
use uuid::Uuid;

/// Test application: service, store and owned resources.
pub struct TestApp {
    pub service: UploadService,
    pub store: Arc<InMemoryMetadataStore>,
    pub storage: LocalStorage,
    pub owner_id: Uuid,
    pub _temp_dir: TempDir,
}

impl TestApp {
    /// Number of regular files under the storage root
    pub fn files_on_disk(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|e| {
                            let path = e.path();
                            if path.is_dir() {
                                count(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self._temp_dir.path())
    }

    pub fn single(&self, name: &str, data: Vec<u8>) -> SingleUpload {
        SingleUpload {
            owner_id: self.owner_id,
            folder_id: None,
            name: name.to_string(),
            size: data.len() as i64,
            confirm_replace: false,
            thumbnail_data: None,
            stream: Box::new(std::io::Cursor::new(data)),
        }
    }
}

pub fn test_config() -> UploadConfig {
    let mut config = UploadConfig::for_tier(DeploymentTier::Development);
    config.max_concurrent_uploads = 4;
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config()).await
}

/// Setup a service with the given config and an isolated storage root.
pub async fn setup_test_app_with(config: UploadConfig) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(
        temp_dir.path(),
        UniqueNamer::new(config.unique_name_max_attempts),
    )
    .await
    .unwrap();
    let store = Arc::new(InMemoryMetadataStore::new());

    let service = UploadService::new(
        config,
        storage.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    );

    TestApp {
        service,
        store,
        storage,
        owner_id: Uuid::new_v4(),
        _temp_dir: temp_dir,
    }
}

pub fn bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn entry(name: &str, data: Vec<u8>) -> BatchEntry {
    BatchEntry {
        name: name.to_string(),
        size: data.len() as i64,
        stream: Box::new(std::io::Cursor::new(data)),
    }
}
