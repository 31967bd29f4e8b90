//! Geofence density endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use fieldmap_common::EntityKind;
use serde_json::Value;

use super::{current_features, json_rejection, number};
use crate::services::{geofence_density, Geofence, GeofenceDensity};
use crate::{ApiError, ApiResult, AppState};

/// `coordinates` as `[lon, lat]` pairs
fn parse_ring(body: &Value) -> ApiResult<Vec<[f64; 2]>> {
    let points = body
        .get("coordinates")
        .and_then(Value::as_array)
        .filter(|points| !points.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required parameters".to_string()))?;

    points
        .iter()
        .map(|point| match point.as_array().map(Vec::as_slice) {
            Some([lon, lat, ..]) => match (number(lon), number(lat)) {
                (Some(lon), Some(lat)) => Ok([lon, lat]),
                _ => Err(invalid_coordinates()),
            },
            _ => Err(invalid_coordinates()),
        })
        .collect()
}

fn invalid_coordinates() -> ApiError {
    ApiError::BadRequest("Coordinates must be [longitude, latitude] pairs".to_string())
}

/// POST /geofence/get-geofence-data
///
/// **Request:** `{"coordinates": [[lon, lat], ...]}`
/// **Response:** counts, densities per 100 mi² and the fence area
pub async fn get_geofence_data(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<GeofenceDensity>> {
    let Json(body) = payload.map_err(json_rejection)?;
    let fence = Geofence::from_ring(&parse_ring(&body)?)?;

    let technicians = current_features(&state, EntityKind::Technician).await;
    let customers = current_features(&state, EntityKind::Customer).await;

    Ok(Json(geofence_density(&fence, &technicians, &customers)))
}

/// Build geofence routes
pub fn geofence_routes() -> Router<AppState> {
    Router::new().route("/geofence/get-geofence-data", post(get_geofence_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ring() {
        let ring = parse_ring(&json!({"coordinates": [[-89.7, 39.7], [-89.5, 39.7], [-89.6, 39.9]]})).unwrap();
        assert_eq!(ring, vec![[-89.7, 39.7], [-89.5, 39.7], [-89.6, 39.9]]);

        assert!(parse_ring(&json!({})).is_err());
        assert!(parse_ring(&json!({"coordinates": []})).is_err());
        assert!(parse_ring(&json!({"coordinates": [[1.0]]})).is_err());
    }
}
