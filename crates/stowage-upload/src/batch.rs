use std::time::Instant;

use stowage_core::{validation, AppError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conflict::ConflictDecision;
use crate::service::{PersistRequest, UploadService};
use crate::types::{BatchEntry, BatchFileOutcome, BatchFileResult, BatchReport, BatchUpload};

impl UploadService {
    /// Upload several files in one request.
    ///
    /// The batch holds one admission slot and passes one quota check for the sum of all
    /// declared sizes. Files are then processed in order; a failing file is recorded in
    /// the report and does not stop the others. Same-name conflicts are never replaced
    /// in a batch.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(owner_id = %request.owner_id, file_count = request.files.len())
    )]
    pub async fn upload_batch(
        &self,
        request: BatchUpload,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let _lease = self.gate.try_acquire()?;
        let start = Instant::now();

        let BatchUpload {
            owner_id,
            folder_id,
            files,
        } = request;

        if files.is_empty() {
            return Err(AppError::InvalidInput("No files to upload".to_string()));
        }

        if let Some(empty) = files.iter().find(|f| f.size <= 0) {
            return Err(AppError::InvalidInput(format!("File '{}' is empty", empty.name)));
        }

        let total_size = files.iter().fold(0i64, |acc, f| acc.saturating_add(f.size));
        self.quota.check(owner_id, total_size).await?;
        let folder_id = self.resolve_upload_folder(owner_id, folder_id).await?;

        let mut results = Vec::with_capacity(files.len());
        for entry in files {
            let result = self
                .upload_batch_entry(owner_id, folder_id, entry, cancel)
                .await;
            if !result.is_success() {
                tracing::warn!(
                    file_name = %result.name,
                    outcome = ?result.outcome,
                    reason = result.reason.as_deref().unwrap_or_default(),
                    "Batch entry failed"
                );
            }
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        tracing::info!(
            total = report.total,
            success_count = report.success_count,
            failed_count = report.failed_count,
            size_bytes = total_size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch upload finished"
        );

        Ok(report)
    }

    async fn upload_batch_entry(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        entry: BatchEntry,
        cancel: &CancellationToken,
    ) -> BatchFileResult {
        let BatchEntry { name, size, stream } = entry;

        let file_type = match validation::validate_upload(&name, size, &self.config) {
            Ok(file_type) => file_type,
            Err(e) => {
                let outcome = BatchFileOutcome::from_error(&e);
                return BatchFileResult::failed(name, outcome, e.to_string());
            }
        };

        let decision = match self
            .conflicts
            .resolve(self.files.as_ref(), owner_id, &name, size, false)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                let outcome = BatchFileOutcome::from_error(&e);
                return BatchFileResult::failed(name, outcome, e.to_string());
            }
        };

        match decision {
            ConflictDecision::Proceed => {}
            ConflictDecision::RejectDuplicate { existing } => {
                return BatchFileResult::failed(
                    name,
                    BatchFileOutcome::DuplicateRejected,
                    format!("File already exists (id {})", existing.id),
                );
            }
            ConflictDecision::RequireConfirmation { .. }
            | ConflictDecision::ReplaceConfirmed { .. } => {
                return BatchFileResult::failed(
                    name,
                    BatchFileOutcome::NameConflict,
                    "A different file with this name already exists; upload it on its own to replace it",
                );
            }
        }

        let persisted = self
            .persist(
                PersistRequest {
                    owner_id,
                    folder_id,
                    name: &name,
                    size,
                    file_type,
                    thumbnail_data: None,
                },
                stream,
                cancel,
            )
            .await;

        match persisted {
            Ok(record) => BatchFileResult::stored(name, record),
            Err(e) => {
                let outcome = BatchFileOutcome::from_error(&e);
                BatchFileResult::failed(name, outcome, e.to_string())
            }
        }
    }
}
