//! Completion tracking for a lookup run.
//!
//! Each submitted address gets exactly one [`UnitGuard`]. The guard owns a
//! sender into the result channel, so the channel closes when the last guard
//! is dropped, after every outcome has been posted. A guard dropped without
//! posting (panicked or aborted task) posts an internal error instead, which
//! keeps the one-outcome-per-address count intact.

use crate::error::LookupError;
use crate::types::LocationResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub(crate) type Outcome = Result<LocationResult, LookupError>;

/// Outstanding-unit counter shared by every guard of one run.
#[derive(Debug)]
pub struct CompletionTracker {
    total: usize,
    remaining: AtomicUsize,
}

impl CompletionTracker {
    pub(crate) fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            total,
            remaining: AtomicUsize::new(total),
        })
    }

    /// Number of addresses submitted.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Addresses that have not posted an outcome yet.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn is_drained(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns true for the single call that brings the count to zero.
    fn finish_one(&self) -> bool {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "completion counter underflow");
        previous == 1
    }
}

/// Per-address completion handle.
pub(crate) struct UnitGuard {
    address: String,
    posted: bool,
    tracker: Arc<CompletionTracker>,
    // Dropped after the counter update in `Drop`, so the channel can only
    // close once the count has reached zero.
    sender: UnboundedSender<Outcome>,
}

impl UnitGuard {
    pub(crate) fn new(
        address: String,
        sender: UnboundedSender<Outcome>,
        tracker: Arc<CompletionTracker>,
    ) -> Self {
        Self {
            address,
            posted: false,
            tracker,
            sender,
        }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    /// Post this unit's outcome. Later calls are ignored.
    pub(crate) fn post(&mut self, outcome: Outcome) {
        if self.posted {
            return;
        }
        self.posted = true;

        // The receiver is gone only if the caller dropped the stream.
        if self.sender.send(outcome).is_err() {
            tracing::debug!(address = %self.address, "result stream dropped, outcome discarded");
        }
    }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if !self.posted {
            tracing::warn!(address = %self.address, "lookup task ended without an outcome");
            let address = self.address.clone();
            self.post(Err(LookupError::internal_for(address, "lookup task aborted")));
        }

        if self.tracker.finish_one() {
            tracing::debug!(total = self.tracker.total(), "all lookups finished");
        }
    }
}
