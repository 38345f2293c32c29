//! Merged result stream for a lookup run.
//!
//! Successes and failures travel on one channel as
//! `Result<LocationResult, LookupError>`, so arrival order is preserved and
//! neither arm can starve the other. The stream ends (`None`) once every
//! unit has posted and dropped its sender.

use crate::concurrent::admission::AdmissionController;
use crate::concurrent::lifecycle::{CompletionTracker, Outcome};
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;

/// Stream of lookup outcomes in arrival order.
///
/// Yields exactly one item per submitted address, then `None`. Not
/// restartable: once drained, it stays at `None`.
pub struct LookupStream {
    receiver: UnboundedReceiver<Outcome>,
    admission: Arc<AdmissionController>,
    tracker: Arc<CompletionTracker>,
    received: usize,
}

impl LookupStream {
    pub(crate) fn new(
        receiver: UnboundedReceiver<Outcome>,
        admission: Arc<AdmissionController>,
        tracker: Arc<CompletionTracker>,
    ) -> Self {
        Self {
            receiver,
            admission,
            tracker,
            received: 0,
        }
    }

    /// Wait for the next outcome.
    pub async fn next_outcome(&mut self) -> Option<Outcome> {
        let outcome = self.receiver.recv().await;
        if outcome.is_some() {
            self.received += 1;
        }
        outcome
    }

    /// Drain the stream into a vector, in arrival order.
    pub async fn collect_all(mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(self.tracker.total());
        while let Some(outcome) = self.next_outcome().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Number of addresses in this run.
    pub fn total(&self) -> usize {
        self.tracker.total()
    }

    /// Outcomes handed to the caller so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Units that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.tracker.remaining()
    }

    pub fn capacity(&self) -> usize {
        self.admission.capacity()
    }

    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.admission.peak_in_flight()
    }
}

impl Stream for LookupStream {
    type Item = Outcome;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.receiver.poll_recv(cx);
        if let Poll::Ready(Some(_)) = &polled {
            this.received += 1;
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.tracker.total().saturating_sub(self.received);
        (0, Some(left))
    }
}
