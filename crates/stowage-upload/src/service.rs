//! Single-file upload pipeline.
//!
//! admission → validation → quota → conflict resolution → unique naming → verified
//! write → record creation. The admission lease is held for the whole request.

use std::sync::Arc;
use std::time::Instant;

use stowage_core::{validation, AppError, FileRecord, FileType, UploadConfig};
use stowage_db::{FileRecordStore, FolderLookup, QuotaLookup};
use stowage_storage::LocalStorage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::admission::AdmissionGate;
use crate::conflict::{ConflictDecision, ConflictResolver};
use crate::persist::Persister;
use crate::quota::QuotaGuard;
use crate::throttle::RateLimitedStream;
use crate::tracker::{UploadTracker, CLEANUP_INTERVAL, TASK_RETENTION};
use crate::types::{SingleUpload, UploadOutcome, UploadStream};

/// Upload pipeline entry point. Cheap to clone; all shared state sits behind `Arc`.
#[derive(Clone)]
pub struct UploadService {
    pub(crate) config: Arc<UploadConfig>,
    pub(crate) gate: Arc<AdmissionGate>,
    pub(crate) files: Arc<dyn FileRecordStore>,
    pub(crate) folders: Arc<dyn FolderLookup>,
    pub(crate) quota: QuotaGuard,
    pub(crate) conflicts: ConflictResolver,
    pub(crate) persister: Persister,
    pub(crate) storage: LocalStorage,
    pub(crate) tracker: Arc<UploadTracker>,
}

/// What to persist once all checks have passed.
pub(crate) struct PersistRequest<'a> {
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: &'a str,
    pub size: i64,
    pub file_type: FileType,
    pub thumbnail_data: Option<String>,
}

impl UploadService {
    pub fn new(
        config: UploadConfig,
        storage: LocalStorage,
        files: Arc<dyn FileRecordStore>,
        folders: Arc<dyn FolderLookup>,
        limits: Arc<dyn QuotaLookup>,
    ) -> Self {
        tracing::info!(
            tier = config.tier.as_str(),
            max_concurrent_uploads = config.max_concurrent_uploads,
            max_upload_rate_bytes = config.max_upload_rate_bytes,
            storage_path = %storage.base_path().display(),
            "Upload service initialized"
        );

        let tracker = Arc::new(UploadTracker::new());
        if tracker
            .spawn_cleanup(CLEANUP_INTERVAL, TASK_RETENTION)
            .is_none()
        {
            tracing::debug!("No runtime available, upload task cleanup is left to the caller");
        }

        Self {
            gate: AdmissionGate::new(config.max_concurrent_uploads),
            quota: QuotaGuard::new(files.clone(), limits),
            conflicts: ConflictResolver::new(config.duplicate_size_tolerance_bytes),
            persister: Persister::new(storage.clone()),
            tracker,
            config: Arc::new(config),
            files,
            folders,
            storage,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn admission(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    pub fn tracker(&self) -> &Arc<UploadTracker> {
        &self.tracker
    }

    /// Upload one file.
    ///
    /// Rejections that are decisions (duplicate, confirmation needed) come back as
    /// `Ok`; every failure is an `AppError`.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(owner_id = %request.owner_id, file_name = %request.name, size_bytes = request.size)
    )]
    pub async fn upload(
        &self,
        request: SingleUpload,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, AppError> {
        let _lease = self.gate.try_acquire()?;
        let start = Instant::now();

        let SingleUpload {
            owner_id,
            folder_id,
            name,
            size,
            confirm_replace,
            thumbnail_data,
            stream,
        } = request;

        let file_type = validation::validate_upload(&name, size, &self.config)?;
        self.quota.check(owner_id, size).await?;
        let folder_id = self.resolve_upload_folder(owner_id, folder_id).await?;

        let decision = self
            .conflicts
            .resolve(self.files.as_ref(), owner_id, &name, size, confirm_replace)
            .await?;

        match decision {
            ConflictDecision::Proceed => {}
            ConflictDecision::RejectDuplicate { existing } => {
                tracing::info!(
                    existing_id = %existing.id,
                    existing_size = existing.size,
                    "Upload rejected as duplicate"
                );
                return Ok(UploadOutcome::DuplicateRejected { existing });
            }
            ConflictDecision::RequireConfirmation {
                existing,
                size_delta,
            } => {
                tracing::info!(
                    existing_id = %existing.id,
                    size_delta,
                    "Upload needs replace confirmation"
                );
                return Ok(UploadOutcome::ConfirmationRequired {
                    existing,
                    new_size: size,
                    size_delta,
                });
            }
            ConflictDecision::ReplaceConfirmed { existing } => {
                self.conflicts
                    .apply_replacement(self.files.as_ref(), &self.storage, &existing)
                    .await?;
            }
        }

        let record = self
            .persist(
                PersistRequest {
                    owner_id,
                    folder_id,
                    name: &name,
                    size,
                    file_type,
                    thumbnail_data,
                },
                stream,
                cancel,
            )
            .await?;

        tracing::info!(
            file_id = %record.id,
            path = %record.path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File uploaded"
        );

        Ok(UploadOutcome::Stored(record))
    }

    /// A target folder that does not exist is ignored and the file lands in the root.
    pub(crate) async fn resolve_upload_folder(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Option<Uuid>, AppError> {
        let Some(fid) = folder_id else {
            return Ok(None);
        };

        if self.folders.folder_exists(owner_id, fid).await? {
            Ok(Some(fid))
        } else {
            tracing::warn!(
                owner_id = %owner_id,
                folder_id = %fid,
                "Target folder not found, storing in root"
            );
            Ok(None)
        }
    }

    /// Unique naming, throttled verified write and record creation, under the upload
    /// timeout and with progress reported to the tracker.
    pub(crate) async fn persist(
        &self,
        request: PersistRequest<'_>,
        stream: UploadStream,
        cancel: &CancellationToken,
    ) -> Result<FileRecord, AppError> {
        let (task_id, task_cancel) = self.tracker.register(
            request.owner_id,
            request.name,
            request.size,
            cancel,
        );

        let result = self
            .persist_tracked(task_id, &task_cancel, request, stream)
            .await;
        match &result {
            Ok(_) => self.tracker.mark_completed(task_id),
            Err(e) => self.tracker.mark_failed(task_id, &e.to_string()),
        }
        result
    }

    /// A task cancelled while still pending stops here without touching the disk; one
    /// cancelled later is interrupted by `task_cancel` during the copy.
    async fn persist_tracked(
        &self,
        task_id: Uuid,
        task_cancel: &CancellationToken,
        request: PersistRequest<'_>,
        stream: UploadStream,
    ) -> Result<FileRecord, AppError> {
        if task_cancel.is_cancelled() {
            return Err(AppError::IncompleteWrite(format!(
                "upload of {} was cancelled before it started",
                request.name
            )));
        }

        let started = self
            .persister
            .start(request.file_type, request.name, request.size)
            .await?;
        self.tracker.mark_uploading(task_id);

        let mut stream =
            RateLimitedStream::new(stream, self.config.max_upload_rate_bytes, task_cancel.clone());
        let tracker = &self.tracker;
        let write = started.write_from(&mut stream, |written| {
            tracker.report_progress(task_id, written)
        });

        let verified = match tokio::time::timeout(self.config.upload_timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    owner_id = %request.owner_id,
                    file_name = %request.name,
                    timeout_secs = self.config.upload_timeout.as_secs(),
                    "Upload timed out"
                );
                return Err(AppError::IncompleteWrite(format!(
                    "upload of {} timed out after {}s",
                    request.name,
                    self.config.upload_timeout.as_secs()
                )));
            }
        };

        let created = verified
            .create_record(
                self.files.as_ref(),
                request.owner_id,
                request.name,
                request.folder_id,
                request.thumbnail_data,
            )
            .await?;

        Ok(created.into_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::UploadStatus;
    use stowage_db::InMemoryMetadataStore;
    use stowage_storage::UniqueNamer;
    use tempfile::TempDir;

    async fn service(dir: &TempDir) -> (UploadService, Arc<InMemoryMetadataStore>) {
        let storage = LocalStorage::new(dir.path(), UniqueNamer::default())
            .await
            .unwrap();
        let store = Arc::new(InMemoryMetadataStore::new());
        let service = UploadService::new(
            UploadConfig::default(),
            storage,
            store.clone(),
            store.clone(),
            store.clone(),
        );
        (service, store)
    }

    #[tokio::test]
    async fn test_cancelled_pending_task_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir).await;
        let owner_id = Uuid::new_v4();

        let (task_id, task_cancel) =
            service
                .tracker
                .register(owner_id, "a.txt", 3, &CancellationToken::new());
        service.tracker.cancel(owner_id, task_id).unwrap();

        let err = service
            .persist_tracked(
                task_id,
                &task_cancel,
                PersistRequest {
                    owner_id,
                    folder_id: None,
                    name: "a.txt",
                    size: 3,
                    file_type: FileType::Document,
                    thumbnail_data: None,
                },
                Box::new(std::io::Cursor::new(b"abc".to_vec())),
            )
            .await
            .unwrap_err();
        service.tracker.mark_failed(task_id, &err.to_string());

        assert!(matches!(err, AppError::IncompleteWrite(_)));
        assert_eq!(
            service.tracker.get(task_id).unwrap().status,
            UploadStatus::Cancelled
        );
        assert_eq!(store.file_count(owner_id).await, 0);
        assert!(!service.storage.exists("document/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_service_sweeps_tracker_in_background() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir).await;

        // The sweep holds a weak reference only
        assert_eq!(Arc::strong_count(service.tracker()), 1);
    }
}
