//! Geocoding gateway
//!
//! Turns a single-line address into a coordinate via the TomTom Search API.
//! "Not found" is a normal answer (`Ok(None)`), not an error.

use async_trait::async_trait;
use fieldmap_common::LatLon;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::TOMTOM_BASE_URL;

const USER_AGENT: &str = concat!("fieldmap/", env!("CARGO_PKG_VERSION"));

/// Geocoding client errors
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("TomTom API key not configured")]
    NotConfigured,
}

/// Address → coordinate lookup
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// First match for `address`, or `None` when the provider has no result
    async fn geocode(&self, address: &str) -> Result<Option<LatLon>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    position: Position,
}

#[derive(Debug, Deserialize)]
struct Position {
    lat: f64,
    lon: f64,
}

/// TomTom Search API geocoder
pub struct TomTomGeocoder {
    http_client: reqwest::Client,
    api_key: String,
    base_url: reqwest::Url,
}

impl TomTomGeocoder {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, TOMTOM_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self, GeocodeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| GeocodeError::ParseError(format!("Invalid base URL {}: {}", base_url, e)))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url,
        })
    }

    /// `{base}/search/2/geocode/{address}.json`, with the address percent-encoded
    fn geocode_url(&self, address: &str) -> Result<reqwest::Url, GeocodeError> {
        let file = format!("{}.json", address);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeocodeError::ParseError("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["search", "2", "geocode", file.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for TomTomGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<LatLon>, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        let url = self.geocode_url(address)?;
        tracing::debug!(address = %address, "Querying TomTom geocoder");

        let response = self
            .http_client
            .get(url)
            .query(&[("key", self.api_key.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeocodeError::ApiError(status.as_u16(), error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::ParseError(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .next()
            .map(|result| LatLon::new(result.position.lat, result.position.lon)))
    }
}
