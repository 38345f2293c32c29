//! ip-api.com client.
//!
//! Issues `GET {endpoint}/{address}` and decodes the JSON body into a
//! [`Location`]. One `reqwest::Client` is built per `IpApiClient` and reused
//! for every lookup; clone the `IpApiClient` (cheap) to share it.

use crate::error::LookupError;
use crate::protocols::LookupService;
use crate::types::{Location, LookupConfig};
use crate::utils::validate_address;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tokio::time::Instant;

/// HTTP client for the ip-api.com JSON API.
#[derive(Clone)]
pub struct IpApiClient {
    /// HTTP client shared by all lookups
    http_client: reqwest::Client,
    /// Base URL; the address is appended as the last path segment
    endpoint: Url,
    /// Optional `lang` query parameter
    lang: Option<String>,
}

impl IpApiClient {
    /// Create a client for the given endpoint with its own HTTP client.
    pub fn new(endpoint: &str) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("geo-lookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LookupError::config(format!("Failed to create HTTP client: {}", e)))?;

        Self::with_client(http_client, endpoint)
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(http_client: reqwest::Client, endpoint: &str) -> Result<Self, LookupError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| LookupError::config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        if endpoint.cannot_be_a_base() {
            return Err(LookupError::config(format!(
                "Endpoint '{}' cannot be used as a base URL",
                endpoint
            )));
        }

        Ok(Self {
            http_client,
            endpoint,
            lang: None,
        })
    }

    /// Build a client from a lookup configuration.
    pub fn from_config(config: &LookupConfig) -> Result<Self, LookupError> {
        let mut client = Self::new(&config.endpoint)?;
        client.lang = config.lang.clone();
        Ok(client)
    }

    pub fn with_lang<L: Into<String>>(mut self, lang: L) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Build the request URL for an address.
    pub fn request_url(&self, address: &str) -> Result<Url, LookupError> {
        validate_address(address)?;

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::invalid_address(address, "endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(address.trim());

        if let Some(lang) = &self.lang {
            url.query_pairs_mut().append_pair("lang", lang);
        }

        Ok(url)
    }

    async fn fetch(&self, url: Url, address: &str, budget: Duration) -> Result<Location, LookupError> {
        let response = self
            .http_client
            .get(url)
            .timeout(budget)
            .send()
            .await
            .map_err(|e| LookupError::from_transport(address, &e, budget))?;

        let status = response.status();
        tracing::debug!(address, %status, "geolocation response");

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unexpected status");
            return Err(LookupError::status(address, status.as_u16(), reason));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::from_transport(address, &e, budget))?;

        let location: Location = serde_json::from_slice(&body)
            .map_err(|e| LookupError::decode(address, e.to_string()))?;

        if location.is_failure() {
            let message = location
                .message
                .clone()
                .unwrap_or_else(|| "service reported failure".to_string());
            return Err(LookupError::rejected(address, message));
        }

        Ok(location)
    }
}

#[async_trait]
impl LookupService for IpApiClient {
    async fn lookup(&self, address: &str, deadline: Instant) -> Result<Location, LookupError> {
        let url = self.request_url(address)?;

        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            return Err(LookupError::deadline_exceeded(address));
        }

        tracing::debug!(address, %url, ?budget, "geolocation request");
        self.fetch(url, address, budget).await
    }
}
