//! TomTom Routing API client
//!
//! Two calls are used: the reachable-range isochrone (relayed verbatim to the
//! map) and point-to-point route summaries (consumed by the nearest-technician
//! ranking). A single nearest-technician query fans out into one route request
//! per candidate, so every request passes a client-side quota first.

use async_trait::async_trait;
use fieldmap_common::LatLon;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::config::TOMTOM_BASE_URL;

const USER_AGENT: &str = concat!("fieldmap/", env!("CARGO_PKG_VERSION"));
const REQUESTS_PER_SECOND: u32 = 5;

/// Meters per statute mile
pub const METERS_PER_MILE: f64 = 1609.344;

/// Routing client errors
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("TomTom API key not configured")]
    NotConfigured,
}

/// Budget bounding a reachable-range request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TravelBudget {
    TimeSeconds(u64),
    DistanceMeters(f64),
}

impl TravelBudget {
    fn query_pair(self) -> (&'static str, String) {
        match self {
            TravelBudget::TimeSeconds(secs) => ("timeBudgetInSec", secs.to_string()),
            TravelBudget::DistanceMeters(meters) => ("distanceBudgetInMeters", meters.to_string()),
        }
    }
}

/// `routes[0].summary` of a calculateRoute response
///
/// Only `lengthInMeters` is always present; the traffic breakdowns depend on
/// `computeTravelTimeFor=all` and may be missing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub length_in_meters: f64,
    #[serde(default)]
    pub travel_time_in_seconds: Option<u64>,
    #[serde(default)]
    pub traffic_delay_in_seconds: u64,
    #[serde(default)]
    pub no_traffic_travel_time_in_seconds: u64,
    #[serde(default)]
    pub historic_traffic_travel_time_in_seconds: u64,
    #[serde(default)]
    pub live_traffic_incidents_travel_time_in_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    summary: RouteSummary,
}

/// Car routing provider
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Isochrone around `origin`, as returned by the provider
    async fn reachable_range(&self, origin: LatLon, budget: TravelBudget) -> Result<Value, RoutingError>;

    /// Summary of the first route from `from` to `to`; `None` when no route exists
    async fn route(&self, from: LatLon, to: LatLon) -> Result<Option<RouteSummary>, RoutingError>;
}

/// TomTom Routing API client
pub struct TomTomRouting {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TomTomRouting {
    pub fn new(api_key: impl Into<String>) -> Result<Self, RoutingError> {
        Self::with_base_url(api_key, TOMTOM_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self, RoutingError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RoutingError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = governor::RateLimiter::direct(governor::Quota::per_second(per_second));

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, RoutingError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(url = %url, "Querying TomTom routing");

        let response = self
            .http_client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| RoutingError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RoutingError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| RoutingError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl RoutingProvider for TomTomRouting {
    async fn reachable_range(&self, origin: LatLon, budget: TravelBudget) -> Result<Value, RoutingError> {
        let url = format!(
            "{}/routing/1/calculateReachableRange/{},{}/json",
            self.base_url, origin.lat, origin.lon
        );
        let (budget_key, budget_value) = budget.query_pair();
        let params = [
            ("report", "effectiveSettings".to_string()),
            (budget_key, budget_value),
            ("traffic", "true".to_string()),
            ("travelMode", "car".to_string()),
        ];
        self.get_json(&url, &params).await
    }

    async fn route(&self, from: LatLon, to: LatLon) -> Result<Option<RouteSummary>, RoutingError> {
        let url = format!(
            "{}/routing/1/calculateRoute/{},{}:{},{}/json",
            self.base_url, from.lat, from.lon, to.lat, to.lon
        );
        let params = [
            ("traffic", "true".to_string()),
            ("travelMode", "car".to_string()),
            ("computeTravelTimeFor", "all".to_string()),
        ];
        let body: RouteResponse = self.get_json(&url, &params).await?;
        Ok(body.routes.into_iter().next().map(|route| route.summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_query_pair() {
        assert_eq!(
            TravelBudget::TimeSeconds(1800).query_pair(),
            ("timeBudgetInSec", "1800".to_string())
        );
        assert_eq!(
            TravelBudget::DistanceMeters(1609.5).query_pair(),
            ("distanceBudgetInMeters", "1609.5".to_string())
        );
    }

    #[test]
    fn test_route_summary_defaults() {
        let raw = r#"{"routes":[{"summary":{"lengthInMeters":16093,"travelTimeInSeconds":900}}]}"#;
        let body: RouteResponse = serde_json::from_str(raw).unwrap();
        let summary = &body.routes[0].summary;
        assert_eq!(summary.length_in_meters, 16093.0);
        assert_eq!(summary.travel_time_in_seconds, Some(900));
        assert_eq!(summary.traffic_delay_in_seconds, 0);
        assert_eq!(summary.live_traffic_incidents_travel_time_in_seconds, 0);
    }

    #[test]
    fn test_client_creation() {
        assert!(TomTomRouting::new("key").is_ok());
    }
}
