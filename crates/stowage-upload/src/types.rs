//! Request and response types of the upload service.

use serde::Serialize;
use stowage_core::{AppError, FileRecord};
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Inbound byte stream of one file
pub type UploadStream = Box<dyn AsyncRead + Send + Unpin>;

/// One file upload request.
pub struct SingleUpload {
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub size: i64,
    pub confirm_replace: bool,
    /// Inline thumbnail; kept only for videos
    pub thumbnail_data: Option<String>,
    pub stream: UploadStream,
}

/// One entry of a batch upload.
pub struct BatchEntry {
    pub name: String,
    pub size: i64,
    pub stream: UploadStream,
}

pub struct BatchUpload {
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub files: Vec<BatchEntry>,
}

/// Result of a single upload that got past admission, validation and quota.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Stored(FileRecord),
    DuplicateRejected {
        existing: FileRecord,
    },
    ConfirmationRequired {
        existing: FileRecord,
        new_size: i64,
        size_delta: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFileOutcome {
    Stored,
    DuplicateRejected,
    /// Same name, different content; replacing needs a single confirmed upload
    NameConflict,
    ValidationError,
    IncompleteWrite,
    MetadataPersistFailure,
    NameExhausted,
    Failed,
}

impl BatchFileOutcome {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            e if e.is_validation() => BatchFileOutcome::ValidationError,
            AppError::IncompleteWrite(_) => BatchFileOutcome::IncompleteWrite,
            AppError::MetadataPersistFailure(_) => BatchFileOutcome::MetadataPersistFailure,
            AppError::NameExhausted { .. } => BatchFileOutcome::NameExhausted,
            _ => BatchFileOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFileResult {
    pub name: String,
    pub outcome: BatchFileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BatchFileResult {
    pub fn stored(name: String, record: FileRecord) -> Self {
        Self {
            name,
            outcome: BatchFileOutcome::Stored,
            record: Some(record),
            reason: None,
        }
    }

    pub fn failed(name: String, outcome: BatchFileOutcome, reason: impl Into<String>) -> Self {
        Self {
            name,
            outcome,
            record: None,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == BatchFileOutcome::Stored
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<BatchFileResult>,
}

impl BatchReport {
    pub fn from_results(results: Vec<BatchFileResult>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            success_count,
            failed_count: results.len() - success_count,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_error() {
        assert_eq!(
            BatchFileOutcome::from_error(&AppError::PayloadTooLarge("big".into())),
            BatchFileOutcome::ValidationError
        );
        assert_eq!(
            BatchFileOutcome::from_error(&AppError::IncompleteWrite("short".into())),
            BatchFileOutcome::IncompleteWrite
        );
        assert_eq!(
            BatchFileOutcome::from_error(&AppError::Storage("disk".into())),
            BatchFileOutcome::Failed
        );
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport::from_results(vec![
            BatchFileResult::failed("a.txt".into(), BatchFileOutcome::DuplicateRejected, "exists"),
            BatchFileResult::failed("b.txt".into(), BatchFileOutcome::ValidationError, "empty"),
        ]);
        assert_eq!(report.total, 2);
        assert_eq!(report.success_count, 0);
        assert_eq!(report.failed_count, 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["outcome"], "duplicate_rejected");
        assert!(json["results"][0].get("record").is_none());
    }
}
