//! Collision-free file naming.
//!
//! Each candidate is opened with create-exclusive semantics, so two writers can never
//! end up sharing a path: the loser of a race sees `AlreadyExists` and moves on to the
//! next suffix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use stowage_core::validation::MAX_FILE_NAME_BYTES;
use tokio::fs::{File, OpenOptions};

use crate::error::{StorageError, StorageResult};
use crate::keys::split_extension;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct UniqueNamer {
    max_attempts: u32,
}

impl UniqueNamer {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// The `attempt`-th candidate: the name itself, then `{stem}_{n}{ext}`.
    pub fn candidate(name: &str, attempt: u32) -> String {
        if attempt == 0 {
            return name.to_string();
        }
        let (stem, ext) = split_extension(name);
        format!("{}_{}{}", stem, attempt, ext)
    }

    /// Create a new, empty file in `dir` named after `desired` or its first free variant.
    ///
    /// Returns the chosen name, its full path and the open handle. A candidate longer than
    /// the filesystem name limit fails with `NameTooLong` instead of an I/O error.
    pub async fn create(&self, dir: &Path, desired: &str) -> StorageResult<(String, PathBuf, File)> {
        for attempt in 0..self.max_attempts {
            let name = Self::candidate(desired, attempt);
            if name.len() > MAX_FILE_NAME_BYTES {
                return Err(StorageError::NameTooLong(format!(
                    "{} is {} bytes, limit is {}",
                    name,
                    name.len(),
                    MAX_FILE_NAME_BYTES
                )));
            }
            let path = dir.join(&name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    if attempt > 0 {
                        tracing::debug!(
                            desired = %desired,
                            chosen = %name,
                            attempts = attempt + 1,
                            "Resolved file name collision"
                        );
                    }
                    return Ok((name, path, file));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::UploadFailed(format!(
                        "Failed to create file {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        tracing::warn!(
            desired = %desired,
            dir = %dir.display(),
            attempts = self.max_attempts,
            "Unique name attempts exhausted"
        );

        Err(StorageError::NameExhausted {
            name: desired.to_string(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for UniqueNamer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
