//! Stowage Upload Pipeline
//!
//! Turns an inbound byte stream into a durably stored, quota-respecting file record
//! under bounded concurrency and bandwidth:
//!
//! - [`AdmissionGate`]: lock-free bound on uploads in flight
//! - [`RateLimitedStream`]: cancelable average-throughput pacing
//! - [`QuotaGuard`]: per-owner storage quota from summed record sizes
//! - [`ConflictResolver`]: same-name duplicate / replace decisions
//! - [`Persister`]: verified write, then record creation, with rollback
//! - [`UploadService`]: single and batch uploads plus delete/move/storage info

pub mod admission;
mod batch;
pub mod conflict;
mod lifecycle;
pub mod persist;
pub mod quota;
mod service;
pub mod throttle;
pub mod tracker;
pub mod types;

pub use admission::{AdmissionGate, AdmissionLease};
pub use conflict::{ConflictDecision, ConflictResolver};
pub use persist::{Persister, RecordCreated, WriteStarted, WriteVerified};
pub use quota::QuotaGuard;
pub use service::UploadService;
pub use throttle::RateLimitedStream;
pub use tracker::{UploadStats, UploadStatus, UploadTask, UploadTracker};
pub use types::{
    BatchEntry, BatchFileOutcome, BatchFileResult, BatchReport, BatchUpload, SingleUpload,
    UploadOutcome, UploadStream,
};
