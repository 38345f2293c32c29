//! Main geolocation entry point.
//!
//! This module provides the `GeoLocator` struct that owns the lookup service
//! and configuration, and hands batches to the concurrent processor.

use crate::concurrent::{deadline_after, ConcurrentProcessor, LookupStream};
use crate::error::LookupError;
use crate::protocols::{IpApiClient, LookupService};
use crate::types::{LocationResult, LookupConfig};
use std::sync::Arc;
use tokio::time::Instant;

/// Geolocation front end for one or many addresses.
///
/// # Example
///
/// ```rust,no_run
/// use geo_lookup_lib::{GeoLocator, LookupConfig};
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let locator = GeoLocator::with_config(LookupConfig::default().with_concurrency(5))?;
///     let mut stream = locator.locate_stream(["1.1.1.1", "8.8.8.8"])?;
///
///     while let Some(outcome) = stream.next().await {
///         match outcome {
///             Ok(r) => println!("{}: {:?}", r.address, r.location.city),
///             Err(e) => println!("error: {}", e),
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GeoLocator {
    /// Configuration settings for this locator instance
    config: LookupConfig,
    /// Service every lookup is sent to
    service: Arc<dyn LookupService>,
    /// Fan-out engine bound to `service`
    processor: ConcurrentProcessor,
}

impl GeoLocator {
    /// Create a locator with default configuration and the ip-api.com client.
    pub fn new() -> Result<Self, LookupError> {
        Self::with_config(LookupConfig::default())
    }

    /// Create a locator with custom configuration and the ip-api.com client.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo_lookup_lib::{GeoLocator, LookupConfig};
    /// use std::time::Duration;
    ///
    /// let config = LookupConfig::default()
    ///     .with_concurrency(10)
    ///     .with_timeout(Duration::from_secs(30))
    ///     .with_request_timeout(Duration::from_secs(3));
    ///
    /// let locator = GeoLocator::with_config(config).unwrap();
    /// assert_eq!(locator.config().concurrency, 10);
    /// ```
    pub fn with_config(config: LookupConfig) -> Result<Self, LookupError> {
        let client = IpApiClient::from_config(&config)?;
        Self::with_service(config, Arc::new(client))
    }

    /// Create a locator around any [`LookupService`].
    pub fn with_service(
        config: LookupConfig,
        service: Arc<dyn LookupService>,
    ) -> Result<Self, LookupError> {
        let processor = ConcurrentProcessor::new(Arc::clone(&service), &config)?;
        Ok(Self {
            config,
            service,
            processor,
        })
    }

    /// Look up a single address under the per-request timeout.
    pub async fn locate(&self, address: &str) -> Result<LocationResult, LookupError> {
        let started = Instant::now();
        let deadline = deadline_after(started, self.config.request_timeout);

        match tokio::time::timeout_at(deadline, self.service.lookup(address, deadline)).await {
            Ok(Ok(location)) => Ok(LocationResult {
                address: address.to_string(),
                location,
                lookup_duration: Some(started.elapsed()),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LookupError::timeout(address, self.config.request_timeout)),
        }
    }

    /// Look up many addresses concurrently and stream outcomes as they arrive.
    ///
    /// The overall timeout starts when this is called.
    pub fn locate_stream<I, S>(&self, addresses: I) -> Result<LookupStream, LookupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processor.submit(addresses)
    }

    /// Look up many addresses concurrently and collect every outcome.
    ///
    /// Outcomes are in arrival order, not input order. The vector always has
    /// one entry per input address.
    pub async fn locate_all<I, S>(
        &self,
        addresses: I,
    ) -> Result<Vec<Result<LocationResult, LookupError>>, LookupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.locate_stream(addresses)?.collect_all().await)
    }

    /// Get the current configuration for this locator.
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Sleepy(Duration);

    #[async_trait]
    impl LookupService for Sleepy {
        async fn lookup(&self, _address: &str, _deadline: Instant) -> Result<Location, LookupError> {
            tokio::time::sleep(self.0).await;
            Ok(Location::default())
        }
    }

    #[test]
    fn test_with_config_rejects_bad_endpoint() {
        let config = LookupConfig::default().with_endpoint("::not-a-url::");
        assert!(matches!(
            GeoLocator::with_config(config),
            Err(LookupError::Config { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_applies_request_timeout() {
        let config = LookupConfig::default().with_request_timeout(Duration::from_secs(2));
        let locator = GeoLocator::with_service(config, Arc::new(Sleepy(Duration::from_secs(10)))).unwrap();

        let err = locator.locate("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout { .. }));
        assert_eq!(err.address(), Some("1.1.1.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_success() {
        let locator = GeoLocator::with_service(
            LookupConfig::default(),
            Arc::new(Sleepy(Duration::from_millis(10))),
        )
        .unwrap();

        let result = locator.locate("8.8.8.8").await.unwrap();
        assert_eq!(result.address, "8.8.8.8");
        assert!(result.lookup_duration.is_some());
    }
}
