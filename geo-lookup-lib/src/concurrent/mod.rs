//! Concurrent processing of lookups.
//!
//! [`ConcurrentProcessor::submit`] fans a list of addresses out to a
//! [`LookupService`] and fans the outcomes back in as a [`LookupStream`]:
//!
//! - a dispatcher task walks the addresses in order and admits each one
//!   through the [`AdmissionController`];
//! - every admitted address runs as its own task under a per-call deadline
//!   nested inside the overall deadline;
//! - each task posts exactly one outcome, then releases its permit, then
//!   marks itself done on the [`CompletionTracker`];
//! - the stream ends when the last unit is done.

mod admission;
mod aggregator;
mod lifecycle;

pub use admission::{AdmissionController, AdmissionPermit};
pub use aggregator::LookupStream;
pub use lifecycle::CompletionTracker;

use crate::error::LookupError;
use crate::protocols::LookupService;
use crate::types::{LocationResult, LookupConfig, MAX_TIMEOUT};
use lifecycle::UnitGuard;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

/// `start + budget`, falling back to `start + MAX_TIMEOUT` when the sum
/// does not fit in an `Instant`.
pub(crate) fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .or_else(|| start.checked_add(MAX_TIMEOUT))
        .unwrap_or(start)
}

/// Runs bounded-concurrency lookup batches against one service.
#[derive(Clone)]
pub struct ConcurrentProcessor {
    service: Arc<dyn LookupService>,
    concurrency: usize,
    timeout: Duration,
    request_timeout: Duration,
}

impl ConcurrentProcessor {
    pub fn new(service: Arc<dyn LookupService>, config: &LookupConfig) -> Result<Self, LookupError> {
        config.validate()?;

        Ok(Self {
            service,
            concurrency: config.concurrency,
            timeout: config.timeout,
            request_timeout: config.request_timeout,
        })
    }

    /// Start looking up `addresses` and return the outcome stream.
    ///
    /// Returns immediately; lookups proceed in the background on the current
    /// Tokio runtime. The overall deadline starts now. Every address yields
    /// exactly one outcome on the stream.
    ///
    /// # Errors
    ///
    /// Fails only when called outside a Tokio runtime.
    pub fn submit<I, S>(&self, addresses: I) -> Result<LookupStream, LookupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LookupError::internal(format!("no Tokio runtime: {}", e)))?;

        let admission = Arc::new(AdmissionController::new(self.concurrency)?);
        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        let tracker = CompletionTracker::new(addresses.len());

        // One sender per unit; the original is dropped so the channel closes
        // exactly when the last unit finishes.
        let (sender, receiver) = mpsc::unbounded_channel();
        let guards: Vec<UnitGuard> = addresses
            .into_iter()
            .map(|address| UnitGuard::new(address, sender.clone(), Arc::clone(&tracker)))
            .collect();
        drop(sender);

        let dispatcher = Arc::new(Dispatcher {
            service: Arc::clone(&self.service),
            admission: Arc::clone(&admission),
            request_timeout: self.request_timeout,
            overall_deadline: deadline_after(Instant::now(), self.timeout),
        });

        tracing::info!(
            addresses = tracker.total(),
            concurrency = self.concurrency,
            timeout = ?self.timeout,
            request_timeout = ?self.request_timeout,
            "starting lookup run"
        );

        runtime.spawn(dispatcher.run(guards));

        Ok(LookupStream::new(receiver, admission, tracker))
    }
}

/// State shared by the dispatch loop and every unit of one run.
struct Dispatcher {
    service: Arc<dyn LookupService>,
    admission: Arc<AdmissionController>,
    request_timeout: Duration,
    overall_deadline: Instant,
}

impl Dispatcher {
    async fn run(self: Arc<Self>, guards: Vec<UnitGuard>) {
        let mut pending = guards.into_iter();

        while let Some(mut guard) = pending.next() {
            let permit = match timeout_at(self.overall_deadline, self.admission.acquire()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(e)) => {
                    let err = LookupError::internal_for(guard.address(), e.to_string());
                    guard.post(Err(err));
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        unadmitted = pending.len() + 1,
                        "overall deadline reached before admission"
                    );
                    for mut guard in std::iter::once(guard).chain(pending) {
                        let err = LookupError::deadline_exceeded(guard.address());
                        guard.post(Err(err));
                    }
                    return;
                }
            };

            tracing::debug!(address = guard.address(), in_flight = self.admission.in_flight(), "admitted");

            let unit = Arc::clone(&self);
            tokio::spawn(async move { unit.run_unit(guard, permit).await });
        }
    }

    async fn run_unit(&self, mut guard: UnitGuard, permit: AdmissionPermit) {
        let started = Instant::now();
        let unit_deadline =
            deadline_after(started, self.request_timeout).min(self.overall_deadline);
        let address = guard.address().to_string();

        let outcome = match timeout_at(unit_deadline, self.service.lookup(&address, unit_deadline)).await {
            Ok(Ok(location)) => Ok(LocationResult {
                address: address.clone(),
                location,
                lookup_duration: Some(started.elapsed()),
            }),
            Ok(Err(e)) if e.is_timeout() => Err(self.expired(&address, unit_deadline)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self.expired(&address, unit_deadline)),
        };

        match &outcome {
            Ok(_) => tracing::debug!(address = %address, elapsed = ?started.elapsed(), "lookup succeeded"),
            Err(e) => tracing::warn!(address = %address, kind = %e.kind(), error = %e, "lookup failed"),
        }

        guard.post(outcome);
        drop(permit);
        drop(guard);
    }

    /// Classify an expired unit by which deadline governed it.
    fn expired(&self, address: &str, unit_deadline: Instant) -> LookupError {
        if unit_deadline >= self.overall_deadline {
            LookupError::deadline_exceeded(address)
        } else {
            LookupError::timeout(address, self.request_timeout)
        }
    }
}
