//! Nearest-technician endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use fieldmap_common::{EntityKind, LatLon};
use serde::Serialize;
use serde_json::Value;

use super::{current_features, json_rejection, number};
use crate::services::{nearest_technicians, Bottleneck, NearestQuery, TechnicianMatch};
use crate::{ApiError, ApiResult, AppState};

/// Ranked technicians; the request's location and budget are echoed back
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestTechniciansResponse {
    pub customer_location: Value,
    pub time_budget: Value,
    pub technicians_found: usize,
    pub technicians: Vec<TechnicianMatch>,
}

/// Validate `{customer_location: {lat, lng}, time_budget, max_miles, bottleneck}`
fn parse_query(body: &Value) -> ApiResult<NearestQuery> {
    let location = body
        .get("customer_location")
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::BadRequest("Customer location required".to_string()))?;

    let lat_lng = || ApiError::BadRequest("Customer location must include 'lat' and 'lng'".to_string());
    let lat = location.get("lat").and_then(number).ok_or_else(lat_lng)?;
    let lng = location.get("lng").and_then(number).ok_or_else(lat_lng)?;
    let customer = LatLon::new(lat, lng);
    if !customer.is_valid() {
        return Err(ApiError::BadRequest(
            "Customer location must have 'lat' in [-90, 90] and 'lng' in [-180, 180]".to_string(),
        ));
    }

    let time_budget = body
        .get("time_budget")
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::BadRequest("Time budget required".to_string()))?;
    let time_budget_secs = number(time_budget)
        .ok_or_else(|| ApiError::BadRequest("Time budget must be a number of seconds".to_string()))?;

    Ok(NearestQuery {
        customer,
        time_budget_secs,
        max_miles: body.get("max_miles").and_then(number),
        bottleneck: Bottleneck::parse(body.get("bottleneck").and_then(Value::as_str)),
    })
}

/// POST /technicians/nearest-technicians
///
/// **Errors:**
/// - 400 Bad Request: missing customer location, `lat`/`lng` or time budget;
///   missing `max_miles` unless the bottleneck is `time`
pub async fn get_nearest_technicians(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<NearestTechniciansResponse>> {
    let Json(body) = payload.map_err(json_rejection)?;
    let query = parse_query(&body)?;

    let technicians = current_features(&state, EntityKind::Technician).await;
    let found = nearest_technicians(state.routing.as_ref(), &technicians, &query).await?;

    Ok(Json(NearestTechniciansResponse {
        customer_location: body.get("customer_location").cloned().unwrap_or(Value::Null),
        time_budget: body.get("time_budget").cloned().unwrap_or(Value::Null),
        technicians_found: found.len(),
        technicians: found,
    }))
}

/// Build technician routes
pub fn technician_routes() -> Router<AppState> {
    Router::new().route("/technicians/nearest-technicians", post(get_nearest_technicians))
}
