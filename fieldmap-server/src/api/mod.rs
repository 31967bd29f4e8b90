//! HTTP API handlers for fieldmap-server
//!
//! Thin adapters: parse the request, call a service, shape the response.

pub mod geofence;
pub mod health;
pub mod isochrone;
pub mod map;
pub mod settings;
pub mod technicians;

pub use geofence::geofence_routes;
pub use health::health_routes;
pub use isochrone::isochrone_routes;
pub use map::map_routes;
pub use settings::settings_routes;
pub use technicians::technician_routes;

use axum::extract::rejection::JsonRejection;
use fieldmap_common::{EntityKind, FeatureCollection};
use serde_json::Value;
use tracing::warn;

use crate::services::Slot;
use crate::{ApiError, AppState};

/// Current collection of `kind` for a query; unreadable data counts as none
pub(crate) async fn current_features(state: &AppState, kind: EntityKind) -> FeatureCollection {
    match state.store.read_collection(kind, Slot::Current).await {
        Ok(collection) => collection,
        Err(e) => {
            warn!("Error loading {} features: {}", kind, e);
            FeatureCollection::default()
        }
    }
}

/// Malformed JSON bodies are client errors
pub(crate) fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// Finite number from a JSON number or a numeric string
pub(crate) fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
