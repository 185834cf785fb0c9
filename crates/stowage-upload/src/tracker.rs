//! In-memory registry of upload tasks and their progress.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stowage_core::AppError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tasks untouched for longer than this are dropped by `cleanup`
pub const TASK_RETENTION: Duration = Duration::from_secs(60 * 60);

/// How often the background sweep started by `spawn_cleanup` runs
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    /// Completed, failed and cancelled tasks never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    /// 0-100
    pub progress: u8,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub uploading_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
}

#[derive(Debug)]
struct TrackedTask {
    task: UploadTask,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct UploadTracker {
    tasks: Mutex<HashMap<Uuid, TrackedTask>>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, TrackedTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a pending task.
    ///
    /// Returns the task id and a token that fires when either `parent` is cancelled or
    /// the task itself is cancelled through [`UploadTracker::cancel`].
    pub fn register(
        &self,
        owner_id: Uuid,
        file_name: &str,
        file_size: i64,
        parent: &CancellationToken,
    ) -> (Uuid, CancellationToken) {
        let now = Utc::now();
        let task = UploadTask {
            id: Uuid::new_v4(),
            owner_id,
            file_name: file_name.to_string(),
            file_size,
            progress: 0,
            status: UploadStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        };
        let id = task.id;
        let cancel = parent.child_token();
        self.lock().insert(
            id,
            TrackedTask {
                task,
                cancel: cancel.clone(),
            },
        );
        (id, cancel)
    }

    /// Apply `f` unless the task already reached a terminal status.
    fn update(&self, id: Uuid, f: impl FnOnce(&mut UploadTask)) {
        if let Some(tracked) = self.lock().get_mut(&id) {
            if tracked.task.status.is_terminal() {
                return;
            }
            f(&mut tracked.task);
            tracked.task.updated_at = Utc::now();
        }
    }

    pub fn mark_uploading(&self, id: Uuid) {
        self.update(id, |t| t.status = UploadStatus::Uploading);
    }

    /// Record bytes written so far.
    pub fn report_progress(&self, id: Uuid, written: i64) {
        self.update(id, |t| {
            t.progress = if t.file_size > 0 {
                ((written.clamp(0, t.file_size) * 100) / t.file_size) as u8
            } else {
                0
            };
        });
    }

    pub fn mark_completed(&self, id: Uuid) {
        self.update(id, |t| {
            t.status = UploadStatus::Completed;
            t.progress = 100;
        });
    }

    pub fn mark_failed(&self, id: Uuid, error: &str) {
        self.update(id, |t| {
            t.status = UploadStatus::Failed;
            t.error = Some(error.to_string());
        });
    }

    /// Cancel a task that has not started uploading yet. Its token fires, so the
    /// pipeline stops before writing.
    pub fn cancel(&self, owner_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let mut tasks = self.lock();
        let tracked = tasks
            .get_mut(&id)
            .filter(|t| t.task.owner_id == owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Upload task {} not found", id)))?;

        if tracked.task.status != UploadStatus::Pending {
            return Err(AppError::InvalidInput(format!(
                "Upload task {} can no longer be cancelled",
                id
            )));
        }

        tracked.task.status = UploadStatus::Cancelled;
        tracked.task.updated_at = Utc::now();
        tracked.cancel.cancel();
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<UploadTask> {
        self.lock().get(&id).map(|t| t.task.clone())
    }

    /// Tasks of one owner, newest first
    pub fn list_for_owner(&self, owner_id: Uuid) -> Vec<UploadTask> {
        let mut tasks: Vec<UploadTask> = self
            .lock()
            .values()
            .filter(|t| t.task.owner_id == owner_id)
            .map(|t| t.task.clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub fn stats(&self) -> UploadStats {
        let tasks = self.lock();
        let mut stats = UploadStats {
            total_tasks: tasks.len(),
            ..UploadStats::default()
        };
        for tracked in tasks.values() {
            match tracked.task.status {
                UploadStatus::Pending => stats.pending_tasks += 1,
                UploadStatus::Uploading => stats.uploading_tasks += 1,
                UploadStatus::Completed => stats.completed_tasks += 1,
                UploadStatus::Failed => stats.failed_tasks += 1,
                UploadStatus::Cancelled => stats.cancelled_tasks += 1,
            }
        }
        stats
    }

    /// Drop tasks not updated within `max_idle`. Returns how many were removed.
    pub fn cleanup(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;

        let mut tasks = self.lock();
        let before = tasks.len();
        tasks.retain(|_, t| t.task.updated_at >= cutoff);
        let removed = before - tasks.len();

        if removed > 0 {
            tracing::debug!(removed, remaining = tasks.len(), "Cleaned up upload tasks");
        }
        removed
    }

    /// Run `cleanup(max_idle)` every `interval` on the current runtime.
    ///
    /// The sweep holds only a weak reference and ends once the tracker is dropped.
    /// Returns `None` outside a Tokio runtime.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
    ) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let tracker = Arc::downgrade(self);

        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                tracker.cleanup(max_idle);
            }
        }))
    }
}
