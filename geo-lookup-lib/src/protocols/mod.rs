//! Lookup service implementations.
//!
//! The engine only ever talks to a [`LookupService`]; the HTTP client for
//! ip-api.com is one implementation, and tests plug in their own.

use crate::error::LookupError;
use crate::types::Location;
use async_trait::async_trait;
use tokio::time::Instant;

/// ip-api.com JSON endpoint client
pub mod ip_api;

pub use ip_api::IpApiClient;

/// A service that resolves one address into a location record.
///
/// Implementations must return by `deadline`. The engine additionally
/// drops the future at the deadline, so an implementation that overruns
/// is cancelled rather than waited on.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup(&self, address: &str, deadline: Instant) -> Result<Location, LookupError>;
}
