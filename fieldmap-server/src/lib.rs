//! fieldmap-server library interface
//!
//! Exposes the services and the router for the binary and for integration
//! testing.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceSettings;
use crate::services::{
    Geocoder, LegendStore, RoutingProvider, SnapshotStore, StorageLayout, TomTomGeocoder,
    TomTomRouting, Unconfigured,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// CSV and GeoJSON snapshots
    pub store: Arc<SnapshotStore>,
    /// Map legend colours
    pub legend: Arc<LegendStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub routing: Arc<dyn RoutingProvider>,
    pub settings: Arc<ServiceSettings>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        layout: StorageLayout,
        settings: ServiceSettings,
        geocoder: Arc<dyn Geocoder>,
        routing: Arc<dyn RoutingProvider>,
    ) -> Self {
        Self {
            legend: Arc::new(LegendStore::new(layout.legend_config_path())),
            store: Arc::new(SnapshotStore::new(layout)),
            geocoder,
            routing,
            settings: Arc::new(settings),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// State backed by the TomTom gateways, or by [`Unconfigured`] when no
    /// API key is available
    pub fn with_tomtom(layout: StorageLayout, settings: ServiceSettings) -> ApiResult<Self> {
        let (geocoder, routing): (Arc<dyn Geocoder>, Arc<dyn RoutingProvider>) =
            match settings.tomtom_api_key.as_deref() {
                Some(key) => (
                    Arc::new(
                        TomTomGeocoder::with_base_url(key, &settings.tomtom_base_url)
                            .map_err(|e| ApiError::Internal(e.to_string()))?,
                    ),
                    Arc::new(
                        TomTomRouting::with_base_url(key, &settings.tomtom_base_url)
                            .map_err(|e| ApiError::Internal(e.to_string()))?,
                    ),
                ),
                None => (Arc::new(Unconfigured), Arc::new(Unconfigured)),
            };

        Ok(Self::new(layout, settings, geocoder, routing))
    }

    /// Remember a failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::map_routes())
        .merge(api::settings_routes())
        .merge(api::isochrone_routes())
        .merge(api::geofence_routes())
        .merge(api::technician_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
