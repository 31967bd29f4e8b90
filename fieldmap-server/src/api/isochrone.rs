//! Driving isochrone proxy

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use fieldmap_common::LatLon;
use serde_json::Value;
use tracing::info;

use super::{json_rejection, number};
use crate::services::{Bottleneck, TravelBudget, METERS_PER_MILE};
use crate::{ApiError, ApiResult, AppState};

/// Validated reachable-range request
#[derive(Debug, Clone, PartialEq)]
pub struct ReachableRangeRequest {
    pub origin: LatLon,
    pub budget: TravelBudget,
}

impl ReachableRangeRequest {
    /// `latitude`, `longitude`, `time_budget` and `max_miles` are all required,
    /// whichever bottleneck is chosen
    pub fn from_json(body: &Value) -> ApiResult<Self> {
        let field = |key: &str| body.get(key).filter(|v| !v.is_null());

        let (Some(latitude), Some(longitude), Some(time_budget), Some(max_miles)) = (
            field("latitude"),
            field("longitude"),
            field("time_budget"),
            field("max_miles"),
        ) else {
            return Err(ApiError::BadRequest("Missing required parameters".to_string()));
        };

        let invalid = || ApiError::BadRequest("Invalid parameter type".to_string());
        let latitude = number(latitude).ok_or_else(invalid)?;
        let longitude = number(longitude).ok_or_else(invalid)?;
        let time_budget = number(time_budget).filter(|t| *t >= 0.0).ok_or_else(invalid)?;
        let max_miles = number(max_miles).filter(|m| *m >= 0.0).ok_or_else(invalid)?;

        let origin = LatLon::new(latitude, longitude);
        if !origin.is_valid() {
            return Err(ApiError::BadRequest(
                "Latitude must be in [-90, 90] and longitude in [-180, 180]".to_string(),
            ));
        }

        let bottleneck = Bottleneck::parse(body.get("bottleneck").and_then(Value::as_str));
        let budget = match bottleneck {
            Some(Bottleneck::Distance) => TravelBudget::DistanceMeters(max_miles * METERS_PER_MILE),
            _ => TravelBudget::TimeSeconds(time_budget as u64),
        };

        Ok(Self {
            origin,
            budget,
        })
    }
}

/// POST /driving-isochrone/reachable-range
///
/// **Request:** `{"latitude", "longitude", "time_budget", "max_miles", "bottleneck"}`
/// **Response:** the provider's reachable-range document, unchanged
///
/// **Errors:**
/// - 400 Bad Request: missing or non-numeric parameter
/// - provider status with `{"error", "status_code", "message"}` on provider rejection
pub async fn reachable_range(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload.map_err(json_rejection)?;
    let request = ReachableRangeRequest::from_json(&body)?;

    info!(
        lat = request.origin.lat,
        lon = request.origin.lon,
        budget = ?request.budget,
        "Reachable range requested"
    );

    let range = state.routing.reachable_range(request.origin, request.budget).await?;
    Ok(Json(range))
}

/// Build isochrone routes
pub fn isochrone_routes() -> Router<AppState> {
    Router::new().route("/driving-isochrone/reachable-range", post(reachable_range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_distance_bottleneck_converts_miles() {
        let request = ReachableRangeRequest::from_json(&json!({
            "latitude": 37.7749,
            "longitude": -122.4194,
            "time_budget": 3600,
            "max_miles": 10,
            "bottleneck": "distance"
        }))
        .unwrap();
        assert_eq!(request.origin, LatLon::new(37.7749, -122.4194));
        match request.budget {
            TravelBudget::DistanceMeters(m) => assert!((m - 16093.44).abs() < 1e-6),
            other => panic!("unexpected budget {:?}", other),
        }
    }

    #[test]
    fn test_time_is_the_default_bottleneck() {
        let request = ReachableRangeRequest::from_json(&json!({
            "latitude": "37.7749",
            "longitude": "-122.4194",
            "time_budget": "1800",
            "max_miles": 10
        }))
        .unwrap();
        assert_eq!(request.budget, TravelBudget::TimeSeconds(1800));
    }

    #[test]
    fn test_every_number_is_required() {
        for missing in ["latitude", "longitude", "time_budget", "max_miles"] {
            let mut body = json!({
                "latitude": 1.0, "longitude": 2.0, "time_budget": 60, "max_miles": 5
            });
            body.as_object_mut().unwrap().remove(missing);
            assert!(
                matches!(ReachableRangeRequest::from_json(&body), Err(ApiError::BadRequest(_))),
                "{} should be required",
                missing
            );
        }

        let far = json!({"latitude": 95.0, "longitude": 2.0, "time_budget": 60, "max_miles": 5});
        assert!(matches!(ReachableRangeRequest::from_json(&far), Err(ApiError::BadRequest(_))));

        let bad = json!({"latitude": "north", "longitude": 2.0, "time_budget": 60, "max_miles": 5});
        assert!(matches!(ReachableRangeRequest::from_json(&bad), Err(ApiError::BadRequest(msg)) if msg == "Invalid parameter type"));
    }
}
