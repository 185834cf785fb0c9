//! Admission control for concurrent uploads.
//!
//! A single atomic counter bounds the number of uploads in flight. Admission is strict:
//! a request either gets a slot immediately or is denied, it never waits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stowage_core::AppError;

#[derive(Debug)]
pub struct AdmissionGate {
    in_flight: AtomicUsize,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Take one slot, or fail with `AdmissionDenied` when all are in use.
    ///
    /// The slot is released when the returned lease is dropped.
    pub fn try_acquire(self: &Arc<Self>) -> Result<AdmissionLease, AppError> {
        let mut current = self.in_flight.load(Ordering::SeqCst);
        loop {
            if current >= self.capacity {
                tracing::warn!(
                    in_flight = current,
                    capacity = self.capacity,
                    "Upload admission denied"
                );
                return Err(AppError::AdmissionDenied {
                    in_flight: current,
                    capacity: self.capacity,
                });
            }

            match self.in_flight.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    tracing::debug!(
                        in_flight = current + 1,
                        capacity = self.capacity,
                        "Upload admitted"
                    );
                    return Ok(AdmissionLease {
                        gate: Arc::clone(self),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One admitted upload. Dropping it frees the slot.
#[derive(Debug)]
#[must_use = "dropping the lease releases the admission slot immediately"]
pub struct AdmissionLease {
    gate: Arc<AdmissionGate>,
}

impl Drop for AdmissionLease {
    fn drop(&mut self) {
        self.gate.release();
    }
}
