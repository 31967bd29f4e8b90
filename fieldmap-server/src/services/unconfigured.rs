//! Stand-in gateway used when no TomTom API key is configured
//!
//! The server still starts and serves stored data; every provider call fails
//! with `NotConfigured`.

use async_trait::async_trait;
use fieldmap_common::LatLon;
use serde_json::Value;

use super::geocoder::{GeocodeError, Geocoder};
use super::routing_client::{RouteSummary, RoutingError, RoutingProvider, TravelBudget};

#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl Geocoder for Unconfigured {
    async fn geocode(&self, _address: &str) -> Result<Option<LatLon>, GeocodeError> {
        Err(GeocodeError::NotConfigured)
    }
}

#[async_trait]
impl RoutingProvider for Unconfigured {
    async fn reachable_range(&self, _origin: LatLon, _budget: TravelBudget) -> Result<Value, RoutingError> {
        Err(RoutingError::NotConfigured)
    }

    async fn route(&self, _from: LatLon, _to: LatLon) -> Result<Option<RouteSummary>, RoutingError> {
        Err(RoutingError::NotConfigured)
    }
}
