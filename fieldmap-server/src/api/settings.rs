//! Configuration endpoints for the map front end
//!
//! The TomTom key is handed to the browser so the map SDK can load tiles;
//! legend colours persist in `map_legend_config.json`.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use super::json_rejection;
use crate::services::LegendColors;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

/// GET /config/get-tomtom-api-key
///
/// **Errors:** 500 when no key is configured
pub async fn get_tomtom_api_key(State(state): State<AppState>) -> ApiResult<Json<ApiKeyResponse>> {
    let api_key = state
        .settings
        .tomtom_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("API key not found".to_string()))?;
    Ok(Json(ApiKeyResponse { api_key }))
}

/// GET /config/get-map-legend-colors
///
/// **Response:** `{"customerIconColor": "...", "technicianIconColor": "..."}`
/// **Errors:** 404 when either colour is missing
pub async fn get_map_legend_colors(State(state): State<AppState>) -> ApiResult<Json<LegendColors>> {
    Ok(Json(state.legend.legend_colors().await?))
}

/// POST /config/update-map-legend-colors
///
/// **Request:** `{"customerIconColor": "...", "technicianIconColor": "..."}`
/// **Response:** `{"success": true}`
pub async fn update_map_legend_colors(
    State(state): State<AppState>,
    payload: Result<Json<LegendColors>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(colors) = payload.map_err(json_rejection)?;
    state.legend.update_colors(&colors).await?;
    Ok(Json(json!({ "success": true })))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/config/get-tomtom-api-key", get(get_tomtom_api_key))
        .route("/config/get-map-legend-colors", get(get_map_legend_colors))
        .route("/config/update-map-legend-colors", post(update_map_legend_colors))
}
