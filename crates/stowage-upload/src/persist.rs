//! Verified write-then-record persistence.
//!
//! The persist step moves through three states:
//!
//! - [`WriteStarted`]: a uniquely named file exists on disk and is being filled
//! - [`WriteVerified`]: the file holds exactly the declared number of bytes and is synced
//! - [`RecordCreated`]: the metadata record exists; the file is now owned by the record
//!
//! The first two states own the on-disk file and remove it when dropped, so an error,
//! a timeout or a cancelled request never leaves a partial or unrecorded file behind.

use std::path::PathBuf;

use stowage_core::{AppError, FileRecord, FileType, NewFileRecord};
use stowage_db::FileRecordStore;
use stowage_storage::LocalStorage;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

use crate::throttle::{RateLimitedStream, READ_BUFFER_SIZE};

/// Creates new files in storage and hands out the first persist state.
#[derive(Debug, Clone)]
pub struct Persister {
    storage: LocalStorage,
}

impl Persister {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Reserve a collision-free file for `name` and start the write.
    pub async fn start(
        &self,
        file_type: FileType,
        name: &str,
        declared_size: i64,
    ) -> Result<WriteStarted, AppError> {
        let created = self.storage.create_unique(file_type, name).await?;

        Ok(WriteStarted {
            file: created.file,
            target: StoredFile {
                storage: self.storage.clone(),
                name: created.name,
                key: created.key,
                path: created.path,
                armed: true,
            },
            file_type,
            declared_size,
        })
    }
}

/// A file on disk not yet owned by a metadata record. Removed on drop while armed.
#[derive(Debug)]
struct StoredFile {
    storage: LocalStorage,
    name: String,
    key: String,
    path: PathBuf,
    armed: bool,
}

impl StoredFile {
    async fn remove(mut self) {
        self.armed = false;
        self.storage.delete_best_effort(&self.key).await;
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StoredFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Blocking unlink on purpose: the file must be gone before the failed request
        // returns, and drop cannot await.
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(key = %self.key, "Removed unfinished upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                error = %e,
                key = %self.key,
                "Failed to remove unfinished upload"
            ),
        }
    }
}

#[derive(Debug)]
pub struct WriteStarted {
    file: File,
    target: StoredFile,
    file_type: FileType,
    declared_size: i64,
}

impl WriteStarted {
    /// Name chosen on disk
    pub fn stored_name(&self) -> &str {
        &self.target.name
    }

    /// Copy the stream to disk and verify the byte count.
    ///
    /// Stops as soon as more bytes than declared arrive. `on_progress` receives the total
    /// written so far after every chunk.
    pub async fn write_from<R, F>(
        mut self,
        stream: &mut RateLimitedStream<R>,
        mut on_progress: F,
    ) -> Result<WriteVerified, AppError>
    where
        R: AsyncRead + Unpin,
        F: FnMut(i64),
    {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut written: i64 = 0;

        loop {
            let n = stream.read(&mut buffer).await.map_err(|e| {
                AppError::IncompleteWrite(format!(
                    "failed reading upload stream for {} after {} bytes: {}",
                    self.target.name, written, e
                ))
            })?;
            if n == 0 {
                break;
            }

            if written + n as i64 > self.declared_size {
                return Err(AppError::IncompleteWrite(format!(
                    "received more than the declared {} bytes for {}",
                    self.declared_size, self.target.name
                )));
            }

            self.file.write_all(&buffer[..n]).await.map_err(|e| {
                AppError::IncompleteWrite(format!(
                    "failed writing {}: {}",
                    self.target.path.display(),
                    e
                ))
            })?;
            written += n as i64;
            on_progress(written);
        }

        self.file.flush().await.map_err(|e| {
            AppError::IncompleteWrite(format!(
                "failed flushing {}: {}",
                self.target.path.display(),
                e
            ))
        })?;
        self.file.sync_all().await.map_err(|e| {
            AppError::IncompleteWrite(format!(
                "failed syncing {}: {}",
                self.target.path.display(),
                e
            ))
        })?;

        if written != self.declared_size {
            return Err(AppError::IncompleteWrite(format!(
                "wrote {} of {} declared bytes for {}",
                written, self.declared_size, self.target.name
            )));
        }

        Ok(WriteVerified {
            target: self.target,
            file_type: self.file_type,
            size: written,
        })
    }
}

#[derive(Debug)]
pub struct WriteVerified {
    target: StoredFile,
    file_type: FileType,
    size: i64,
}

impl WriteVerified {
    pub fn storage_key(&self) -> &str {
        &self.target.key
    }

    /// Create the metadata record. On failure the written file is deleted again.
    pub async fn create_record(
        self,
        store: &dyn FileRecordStore,
        owner_id: Uuid,
        display_name: &str,
        folder_id: Option<Uuid>,
        thumbnail_data: Option<String>,
    ) -> Result<RecordCreated, AppError> {
        let new_record = NewFileRecord {
            owner_id,
            name: display_name.to_string(),
            size: self.size,
            file_type: self.file_type,
            path: self.target.key.clone(),
            folder_id,
            thumbnail_data: thumbnail_data.filter(|_| self.file_type.keeps_thumbnail()),
        };

        match store.create(new_record).await {
            Ok(record) => {
                self.target.disarm();
                Ok(RecordCreated { record })
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    owner_id = %owner_id,
                    key = %self.target.key,
                    "Failed to create file record, removing written file"
                );
                self.target.remove().await;
                Err(AppError::MetadataPersistFailure(e.to_string()))
            }
        }
    }
}

#[derive(Debug)]
pub struct RecordCreated {
    record: FileRecord,
}

impl RecordCreated {
    pub fn into_record(self) -> FileRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use stowage_db::InMemoryMetadataStore;
    use stowage_storage::UniqueNamer;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    async fn persister(dir: &Path) -> (Persister, LocalStorage) {
        let storage = LocalStorage::new(dir, UniqueNamer::default()).await.unwrap();
        (Persister::new(storage.clone()), storage)
    }

    fn stream(data: &[u8]) -> RateLimitedStream<&[u8]> {
        RateLimitedStream::new(data, 0, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_full_persist_creates_record() {
        let dir = tempdir().unwrap();
        let (persister, storage) = persister(dir.path()).await;
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let data = b"hello world".to_vec();

        let started = persister
            .start(FileType::Document, "hello.txt", data.len() as i64)
            .await
            .unwrap();
        let mut progress = Vec::new();
        let verified = started
            .write_from(&mut stream(&data), |w| progress.push(w))
            .await
            .unwrap();
        let record = verified
            .create_record(&store, owner, "hello.txt", None, Some("thumb".into()))
            .await
            .unwrap()
            .into_record();

        assert_eq!(record.size, 11);
        assert_eq!(record.path, "document/hello.txt");
        assert_eq!(record.thumbnail_data, None);
        assert_eq!(progress, vec![11]);
        assert_eq!(storage.content_length(&record.path).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_short_stream_leaves_nothing() {
        let dir = tempdir().unwrap();
        let (persister, storage) = persister(dir.path()).await;

        let started = persister
            .start(FileType::Other, "short.bin", 100)
            .await
            .unwrap();
        let err = started
            .write_from(&mut stream(&[0u8; 40]), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::IncompleteWrite(_)));
        assert!(!storage.exists("other/short.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_stream_leaves_nothing() {
        let dir = tempdir().unwrap();
        let (persister, storage) = persister(dir.path()).await;

        let started = persister
            .start(FileType::Other, "long.bin", 10)
            .await
            .unwrap();
        let err = started
            .write_from(&mut stream(&[0u8; 64]), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::IncompleteWrite(_)));
        assert!(!storage.exists("other/long.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_failure_removes_file() {
        let dir = tempdir().unwrap();
        let (persister, storage) = persister(dir.path()).await;
        let store = InMemoryMetadataStore::new();
        store.fail_next_create();

        let verified = persister
            .start(FileType::Image, "pic.png", 4)
            .await
            .unwrap()
            .write_from(&mut stream(b"\x89PNG"), |_| {})
            .await
            .unwrap();
        assert!(storage.exists(verified.storage_key()).await.unwrap());

        let err = verified
            .create_record(&store, Uuid::new_v4(), "pic.png", None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MetadataPersistFailure(_)));
        assert!(!storage.exists("image/pic.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_dropping_started_write_removes_file() {
        let dir = tempdir().unwrap();
        let (persister, storage) = persister(dir.path()).await;

        let started = persister
            .start(FileType::Video, "clip.mp4", 10)
            .await
            .unwrap();
        assert_eq!(started.stored_name(), "clip.mp4");
        assert!(storage.exists("video/clip.mp4").await.unwrap());

        drop(started);
        assert!(!storage.exists("video/clip.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_video_keeps_thumbnail() {
        let dir = tempdir().unwrap();
        let (persister, _storage) = persister(dir.path()).await;
        let store = InMemoryMetadataStore::new();

        let record = persister
            .start(FileType::Video, "clip.mp4", 3)
            .await
            .unwrap()
            .write_from(&mut stream(b"abc"), |_| {})
            .await
            .unwrap()
            .create_record(
                &store,
                Uuid::new_v4(),
                "clip.mp4",
                None,
                Some("data:image/jpeg;base64,AA".into()),
            )
            .await
            .unwrap()
            .into_record();

        assert_eq!(
            record.thumbnail_data.as_deref(),
            Some("data:image/jpeg;base64,AA")
        );
    }
}
