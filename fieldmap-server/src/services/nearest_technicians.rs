//! Nearest-technician ranking
//!
//! Technicians are prefiltered by straight-line radius, then routed by car to
//! the customer and ranked by driving distance.

use fieldmap_common::{Error, FeatureCollection, LatLon, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::routing_client::{RouteSummary, RoutingProvider, METERS_PER_MILE};
use super::spatial::within_radius;

/// Straight-line miles assumed reachable per minute of budget when
/// prefiltering a time-bounded search
const PREFILTER_MILES_PER_MINUTE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bottleneck {
    Time,
    Distance,
}

impl Bottleneck {
    /// `"time"` / `"distance"`; anything else is no explicit bottleneck
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "time" => Some(Bottleneck::Time),
            "distance" => Some(Bottleneck::Distance),
            _ => None,
        }
    }
}

/// One nearest-technician search
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub customer: LatLon,
    pub time_budget_secs: f64,
    pub max_miles: Option<f64>,
    pub bottleneck: Option<Bottleneck>,
}

impl NearestQuery {
    /// Straight-line radius used to pick routing candidates
    ///
    /// Only an explicit time bottleneck derives it from the time budget.
    pub fn prefilter_radius_miles(&self) -> Result<f64> {
        match self.bottleneck {
            Some(Bottleneck::Time) => Ok(self.time_budget_secs / 60.0 * PREFILTER_MILES_PER_MINUTE),
            _ => self
                .max_miles
                .ok_or_else(|| Error::InvalidInput("max_miles required unless bottleneck is 'time'".to_string())),
        }
    }

    /// A routed candidate stays unless its travel time exceeds the budget;
    /// distance-bounded searches keep every candidate
    pub fn keeps(&self, summary: &RouteSummary) -> bool {
        if self.bottleneck == Some(Bottleneck::Distance) {
            return true;
        }
        summary
            .travel_time_in_seconds
            .is_some_and(|secs| secs as f64 <= self.time_budget_secs)
    }
}

/// Ranked technician, in the shape the map front end renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicianMatch {
    pub name: String,
    pub driving_distance: String,
    pub estimated_duration: String,
    pub duration_in_traffic: String,
    pub no_traffic_travel_time: String,
    pub historic_traffic_travel_time: String,
    pub live_traffic_incidents_travel_time: String,
    /// `[lat, lon]`
    pub location: [f64; 2],
    #[serde(skip)]
    pub length_in_meters: f64,
}

impl TechnicianMatch {
    fn new(name: String, location: LatLon, summary: &RouteSummary) -> Self {
        Self {
            name,
            driving_distance: format!("{:.1} miles", summary.length_in_meters / METERS_PER_MILE),
            estimated_duration: summary
                .travel_time_in_seconds
                .map(minutes)
                .unwrap_or_else(|| "N/A".to_string()),
            duration_in_traffic: minutes(summary.traffic_delay_in_seconds),
            no_traffic_travel_time: minutes(summary.no_traffic_travel_time_in_seconds),
            historic_traffic_travel_time: minutes(summary.historic_traffic_travel_time_in_seconds),
            live_traffic_incidents_travel_time: minutes(summary.live_traffic_incidents_travel_time_in_seconds),
            location: [location.lat, location.lon],
            length_in_meters: summary.length_in_meters,
        }
    }
}

/// Whole minutes, rounded down
fn minutes(secs: u64) -> String {
    format!("{} minutes", secs / 60)
}

/// Technicians able to reach `query.customer`, nearest by road first
///
/// Only features with a non-empty `name` are candidates. A failed route
/// request skips that technician.
pub async fn nearest_technicians(
    routing: &dyn RoutingProvider,
    technicians: &FeatureCollection,
    query: &NearestQuery,
) -> Result<Vec<TechnicianMatch>> {
    let radius = query.prefilter_radius_miles()?;

    let candidates: Vec<(String, LatLon)> = within_radius(technicians, query.customer, radius)
        .into_iter()
        .filter_map(|(feature, location)| {
            feature
                .property_str("name")
                .filter(|name| !name.trim().is_empty())
                .map(|name| (name, location))
        })
        .collect();

    debug!(radius_miles = radius, candidates = candidates.len(), "Prefiltered technicians");

    let mut matches = Vec::new();
    for (name, location) in candidates {
        let summary = match routing.route(location, query.customer).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                debug!(technician = %name, "No route to customer");
                continue;
            }
            Err(e) => {
                warn!(technician = %name, "Route request failed: {}", e);
                continue;
            }
        };

        if query.keeps(&summary) {
            matches.push(TechnicianMatch::new(name, location, &summary));
        }
    }

    matches.sort_by(|a, b| a.length_in_meters.total_cmp(&b.length_in_meters));
    info!(found = matches.len(), "Nearest technician search complete");
    Ok(matches)
}
