use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use stowage_core::FileType;
use tokio::fs;

use crate::error::{StorageError, StorageResult};
use crate::keys::storage_key;
use crate::naming::UniqueNamer;

/// A freshly created, still empty file reserved under a unique name.
#[derive(Debug)]
pub struct CreatedFile {
    /// Name chosen on disk (may carry a `_n` suffix)
    pub name: String,
    /// Storage key relative to the root
    pub key: String,
    pub path: PathBuf,
    pub file: fs::File,
}

/// Local filesystem storage implementation
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    namer: UniqueNamer,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/stowage/uploads")
    /// * `namer` - Collision naming policy for new files
    pub async fn new(base_path: impl Into<PathBuf>, namer: UniqueNamer) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path, namer })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys containing path traversal sequences or absolute paths, and keys
    /// whose existing target resolves outside the base directory.
    pub fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.starts_with('/')
            || storage_key.split(['/', '\\']).any(|part| part == "..")
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Reserve a new file for `desired_name` in the directory of `file_type`.
    ///
    /// The file is created exclusively; on collision the next `_n` suffix is tried.
    pub async fn create_unique(
        &self,
        file_type: FileType,
        desired_name: &str,
    ) -> StorageResult<CreatedFile> {
        let dir = self.key_to_path(file_type.as_str())?;
        fs::create_dir_all(&dir).await?;

        let (name, path, file) = self.namer.create(&dir, desired_name).await?;
        let key = storage_key(file_type, &name);

        tracing::debug!(
            path = %path.display(),
            key = %key,
            "Local storage file reserved"
        );

        Ok(CreatedFile {
            name,
            key,
            path,
            file,
        })
    }

    /// Delete a file by its storage key. A missing file is not an error.
    pub async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    /// Delete a file, logging instead of failing.
    pub async fn delete_best_effort(&self, storage_key: &str) {
        if let Err(e) = self.delete(storage_key).await {
            tracing::warn!(
                error = %e,
                key = %storage_key,
                "Failed to delete physical file"
            );
        }
    }

    pub async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    pub async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
