//! Core data types for geolocation lookups.
//!
//! This module defines the decoded location record, the per-address result
//! wrapper, and the configuration used to drive a lookup run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default geolocation endpoint; the address is appended as a path segment.
pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com/json";

/// Upper bound for both the overall and the per-request timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Location record as returned by the geolocation API.
///
/// Every field is optional on decode. The service omits fields it has no
/// data for, and failed queries only carry `status`, `message` and `query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// "success" or "fail"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Reason for a "fail" status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// UTC offset in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Autonomous system, e.g. "AS15169 Google LLC"
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub as_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosting: Option<bool>,
}

impl Location {
    /// Whether the service reported an in-band failure for this query.
    pub fn is_failure(&self) -> bool {
        matches!(self.status.as_deref(), Some(s) if s.eq_ignore_ascii_case("fail"))
    }
}

/// Successful lookup of one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationResult {
    /// The address as submitted by the caller
    pub address: String,

    /// Decoded record
    pub location: Location,

    /// Time from admission to completion of the lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_duration: Option<Duration>,
}

/// Configuration options for a lookup run.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Maximum number of lookups in flight at once
    /// Default: 5, Range: 1-100
    pub concurrency: usize,

    /// Overall deadline for the whole run, measured from submission
    /// Default: 5 seconds
    pub timeout: Duration,

    /// Deadline for each individual lookup once admitted
    /// Default: 2 seconds
    pub request_timeout: Duration,

    /// Base URL of the geolocation API
    pub endpoint: String,

    /// Optional response language (e.g. "de", "fr")
    pub lang: Option<String>,
}

/// Output mode for displaying results.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    /// Print each outcome as it arrives
    Streaming,

    /// Collect every outcome before printing
    Collected,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(2),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            lang: None,
        }
    }
}

impl LookupConfig {
    /// Set the concurrency, clamped to 1-100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }

    /// Set the overall run deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-lookup deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_endpoint<E: Into<String>>(mut self, endpoint: E) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_lang<L: Into<String>>(mut self, lang: L) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Check the configuration before a run starts.
    ///
    /// Fields are public, so the clamping in [`with_concurrency`](Self::with_concurrency)
    /// can be bypassed; this catches the result.
    pub fn validate(&self) -> Result<(), crate::LookupError> {
        if self.concurrency == 0 {
            return Err(crate::LookupError::config("Concurrency must be at least 1"));
        }
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(crate::LookupError::config(
                "Overall timeout must be non-zero and at most 24h",
            ));
        }
        if self.request_timeout.is_zero() || self.request_timeout > MAX_TIMEOUT {
            return Err(crate::LookupError::config(
                "Request timeout must be non-zero and at most 24h",
            ));
        }
        reqwest::Url::parse(&self.endpoint).map_err(|e| {
            crate::LookupError::config(format!("Invalid endpoint '{}': {}", self.endpoint, e))
        })?;
        Ok(())
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Streaming => write!(f, "Streaming"),
            OutputMode::Collected => write!(f, "Collected"),
        }
    }
}
