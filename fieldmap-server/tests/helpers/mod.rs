//! Shared fixtures for fieldmap-server integration tests
//!
//! In-memory provider doubles plus helpers for driving the router with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use fieldmap_common::LatLon;
use fieldmap_server::config::ServiceSettings;
use fieldmap_server::services::spatial::geodesic_miles;
use fieldmap_server::services::{
    GeocodeError, Geocoder, RouteSummary, RoutingError, RoutingProvider, StorageLayout,
    TravelBudget, METERS_PER_MILE,
};
use fieldmap_server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "fieldmap-test-boundary";

/// Geocoder answering from a fixed address table
#[derive(Default)]
pub struct TableGeocoder {
    answers: HashMap<String, LatLon>,
    calls: AtomicUsize,
}

impl TableGeocoder {
    pub fn with(mut self, address: &str, lat: f64, lon: f64) -> Self {
        self.answers.insert(address.to_string(), LatLon::new(lat, lon));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<LatLon>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers.get(address).copied())
    }
}

/// Routing double: road distance equals straight-line distance, one meter
/// per second of travel
///
/// `reachable_range` replays `range_reply`.
pub struct StubRouting {
    pub range_reply: Result<Value, (u16, String)>,
    pub budgets: Mutex<Vec<TravelBudget>>,
}

impl Default for StubRouting {
    fn default() -> Self {
        Self {
            range_reply: Ok(json!({"reachableRange": {"boundary": []}})),
            budgets: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RoutingProvider for StubRouting {
    async fn reachable_range(&self, origin: LatLon, budget: TravelBudget) -> Result<Value, RoutingError> {
        self.budgets.lock().unwrap().push(budget);
        match &self.range_reply {
            Ok(reply) => {
                let mut reply = reply.clone();
                reply["reachableRange"]["center"] = json!({"latitude": origin.lat, "longitude": origin.lon});
                Ok(reply)
            }
            Err((status, body)) => Err(RoutingError::ApiError(*status, body.clone())),
        }
    }

    async fn route(&self, from: LatLon, to: LatLon) -> Result<Option<RouteSummary>, RoutingError> {
        let meters = geodesic_miles(from, to) * METERS_PER_MILE;
        let secs = meters as u64;
        Ok(Some(RouteSummary {
            length_in_meters: meters,
            travel_time_in_seconds: Some(secs),
            traffic_delay_in_seconds: 0,
            no_traffic_travel_time_in_seconds: secs,
            historic_traffic_travel_time_in_seconds: secs,
            live_traffic_incidents_travel_time_in_seconds: secs,
        }))
    }
}

/// A temp data folder and a router over it
pub struct TestApp {
    pub dir: TempDir,
    pub geocoder: Arc<TableGeocoder>,
    pub routing: Arc<StubRouting>,
    pub router: Router,
}

impl TestApp {
    pub fn new(geocoder: TableGeocoder) -> Self {
        Self::with_routing(geocoder, StubRouting::default(), Some("test-key"))
    }

    pub fn with_routing(geocoder: TableGeocoder, routing: StubRouting, api_key: Option<&str>) -> Self {
        let dir = TempDir::new().unwrap();
        let geocoder = Arc::new(geocoder);
        let routing = Arc::new(routing);
        let settings = ServiceSettings {
            tomtom_api_key: api_key.map(str::to_string),
            geocode_cooldown: Duration::ZERO,
            ..Default::default()
        };
        let state = AppState::new(
            StorageLayout::new(dir.path()),
            settings,
            geocoder.clone(),
            routing.clone(),
        );
        Self {
            router: build_router(state),
            dir,
            geocoder,
            routing,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// POST a multipart upload; `None` parts are left out
    pub async fn post_upload(&self, uri: &str, csv: Option<&str>, mappings: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(csv, mappings)))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Import the standard technician roster
    pub async fn seed_technicians(&self) {
        let mapping = technician_mapping();
        let (status, body) = self
            .post_upload("/map/replace-technicians-csv-data", Some(TECHNICIAN_CSV), Some(&mapping))
            .await;
        assert_eq!(status, StatusCode::OK, "seed failed: {}", body);
    }
}

pub fn multipart_body(csv: Option<&str>, mappings: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(csv) = csv {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csvFile\"; filename=\"roster.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n"
        ));
    }
    if let Some(mappings) = mappings {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"headerMappings\"\r\n\r\n{mappings}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

pub fn technician_mapping() -> String {
    json!({
        "id": "Tech ID",
        "name": "Full Name",
        "address_one": "Street",
        "address_two": "N/A",
        "city": "City",
        "state": "State",
        "zipcode": "Zip",
        "country": "N/A"
    })
    .to_string()
}

pub const TECHNICIAN_CSV: &str = "Tech ID,Full Name,Street,City,State,Zip\n\
T1,Alice,1 Main St,Springfield,IL,62701\n\
T2,Bob,9 Elm St,Chicago,IL,60601\n";

pub const ALICE_ADDRESS: &str = "1 Main St Springfield IL 62701";
pub const BOB_ADDRESS: &str = "9 Elm St Chicago IL 60601";

/// Springfield and Chicago, roughly 180 miles apart
pub fn roster_geocoder() -> TableGeocoder {
    TableGeocoder::default()
        .with(ALICE_ADDRESS, 39.7817, -89.6501)
        .with(BOB_ADDRESS, 41.8781, -87.6298)
}
