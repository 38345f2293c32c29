//! Admission control for lookups.
//!
//! A counting permit pool built on a Tokio semaphore. A lookup may only
//! start while it holds an [`AdmissionPermit`]; the permit goes back to the
//! pool when dropped, on every exit path.

use crate::error::LookupError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of lookup permits.
#[derive(Debug)]
pub struct AdmissionController {
    /// Semaphore holding the available permits
    semaphore: Arc<Semaphore>,

    /// Fixed pool size
    capacity: usize,

    /// Permits currently held
    in_flight: Arc<AtomicUsize>,

    /// Highest `in_flight` observed
    peak_in_flight: AtomicUsize,
}

impl AdmissionController {
    /// Create a pool with `capacity` permits.
    ///
    /// A capacity of zero would admit nothing and is rejected.
    pub fn new(capacity: usize) -> Result<Self, LookupError> {
        if capacity == 0 {
            return Err(LookupError::config("Concurrency must be at least 1"));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    /// Wait for a permit.
    ///
    /// Waiters are admitted in FIFO order.
    pub async fn acquire(&self) -> Result<AdmissionPermit, LookupError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LookupError::internal("admission pool closed"))?;

        Ok(self.track(permit))
    }

    /// Take a permit only if one is free right now.
    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> Option<AdmissionPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.track(permit))
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> AdmissionPermit {
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::AcqRel);

        AdmissionPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }
}

/// A held permit. Dropping it returns the permit to the pool.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // Runs before `_permit` is dropped, so `in_flight` never reads
        // lower than the number of permits actually held.
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
