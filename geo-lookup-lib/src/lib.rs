//! # Geo Lookup Library
//!
//! Bounded-concurrency IP geolocation lookups with a single merged result
//! stream.
//!
//! Submit a list of addresses and get back a stream that yields exactly one
//! outcome per address, in the order lookups complete. At most
//! `concurrency` lookups are in flight at once; each one runs under its own
//! request timeout nested inside an overall deadline for the whole run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geo_lookup_lib::{GeoLocator, LookupConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let locator = GeoLocator::new()?;
//!     let result = locator.locate("24.48.0.1").await?;
//!
//!     println!("{}: {:?}", result.address, result.location.city);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Admission control**: a semaphore-backed permit pool caps in-flight lookups
//! - **One stream**: successes and failures arrive on one channel, in arrival order
//! - **Deadlines**: per-request timeout plus an overall run deadline
//! - **Pluggable service**: anything implementing [`LookupService`]

// Re-export main public API types and functions
pub use concurrent::{
    AdmissionController, AdmissionPermit, CompletionTracker, ConcurrentProcessor, LookupStream,
};
pub use config::{
    load_env_config, load_env_config_from, ConfigManager, DefaultsConfig, EnvConfig, FileConfig,
    OutputConfig,
};
pub use error::{ErrorKind, LookupError};
pub use locator::GeoLocator;
pub use protocols::{IpApiClient, LookupService};
pub use types::{
    Location, LocationResult, LookupConfig, OutputMode, DEFAULT_ENDPOINT, MAX_TIMEOUT,
};
pub use utils::{parse_address_lines, parse_duration, parse_timeout, validate_address};

// Internal modules - reach their contents through the re-exports above
mod concurrent;
mod config;
mod error;
mod locator;
mod protocols;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LookupError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
