//! Single-slot admission control.
//!
//! At most one synthesis runs at a time. A request that arrives while the
//! slot is taken is turned away immediately instead of queueing.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tts_core::{TtsError, TtsResult};

/// Admission gate backing the busy flag.
#[derive(Debug, Clone)]
pub struct Admission {
    slots: Arc<Semaphore>,
}

/// Held for the lifetime of one synthesis; dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    /// Create a gate with a single slot.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the slot, or fail with [`TtsError::Busy`].
    pub fn try_acquire(&self) -> TtsResult<AdmissionPermit> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .map(|permit| AdmissionPermit { _permit: permit })
            .map_err(|_| TtsError::Busy)
    }

    /// Whether a synthesis is in flight.
    pub fn is_busy(&self) -> bool {
        self.slots.available_permits() == 0
    }
}

impl Default for Admission {
    fn default() -> Self {
        Self::new()
    }
}
