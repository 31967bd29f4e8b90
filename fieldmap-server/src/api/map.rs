//! Map data endpoints: stored GeoJSON and CSV uploads
//!
//! Uploads are `multipart/form-data` with a `csvFile` part and, for imports,
//! a `headerMappings` part holding a JSON object of target field → source
//! column (or `"N/A"`).

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use fieldmap_common::{EntityKind, FeatureCollection};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::services::{csv_column_headers, remap_upload, HeaderMapping, ImportMode, ImportPipeline, ImportSummary, Slot};
use crate::{ApiError, ApiResult, AppState};

/// Upload size cap for roster CSVs
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Parts of a roster upload
#[derive(Debug, Default)]
struct Upload {
    csv: Option<Vec<u8>>,
    header_mappings: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut upload = Upload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("csvFile") => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    upload.csv = Some(bytes.to_vec());
                }
                Some("headerMappings") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    upload.header_mappings = Some(text);
                }
                _ => {}
            }
        }
        Ok(upload)
    }

    /// File contents; a missing or empty part is no upload at all
    fn csv(&self) -> ApiResult<&[u8]> {
        self.csv
            .as_deref()
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))
    }

    fn header_mapping(&self) -> ApiResult<HeaderMapping> {
        let raw = self
            .header_mappings
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("Invalid JSON format".to_string()))?;
        Ok(HeaderMapping::from_json(raw)?)
    }
}

/// Successful import response
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub status: &'static str,
    pub message: String,
    pub file_path: String,
    pub geojson_file_path: String,
    pub summary: ImportSummary,
}

/// GET /map/get-customers-geojson
pub async fn get_customers_geojson(State(state): State<AppState>) -> ApiResult<Json<FeatureCollection>> {
    stored_features(&state, EntityKind::Customer).await
}

/// GET /map/get-technicians-geojson
pub async fn get_technicians_geojson(State(state): State<AppState>) -> ApiResult<Json<FeatureCollection>> {
    stored_features(&state, EntityKind::Technician).await
}

async fn stored_features(state: &AppState, kind: EntityKind) -> ApiResult<Json<FeatureCollection>> {
    let collection = state.store.read_collection(kind, Slot::Current).await?;
    Ok(Json(collection))
}

/// POST /map/get-csv-column-headers
///
/// **Response:** `{"columns": ["Tech ID", "Full Name", ...]}`
pub async fn get_csv_column_headers(multipart: Multipart) -> ApiResult<Json<Value>> {
    let upload = Upload::read(multipart).await?;
    let columns = csv_column_headers(upload.csv()?)?;
    Ok(Json(json!({ "columns": columns })))
}

/// POST /map/replace-customers-csv-data
pub async fn replace_customers(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<ImportResponse>> {
    import_csv(state, EntityKind::Customer, ImportMode::Replace, multipart).await
}

/// POST /map/replace-technicians-csv-data
pub async fn replace_technicians(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<ImportResponse>> {
    import_csv(state, EntityKind::Technician, ImportMode::Replace, multipart).await
}

/// POST /map/append-customers-csv-data
pub async fn append_customers(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<ImportResponse>> {
    import_csv(state, EntityKind::Customer, ImportMode::Append, multipart).await
}

/// POST /map/append-technicians-csv-data
pub async fn append_technicians(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<ImportResponse>> {
    import_csv(state, EntityKind::Technician, ImportMode::Append, multipart).await
}

/// Validate the upload, remap it, then run the import pipeline
///
/// Every validation happens before the pipeline touches stored files.
async fn import_csv(
    state: AppState,
    kind: EntityKind,
    mode: ImportMode,
    multipart: Multipart,
) -> ApiResult<Json<ImportResponse>> {
    let result = async {
        let upload = Upload::read(multipart).await?;
        let csv = upload.csv()?;
        let mapping = upload.header_mapping()?;
        let records = remap_upload(csv, &mapping, kind)?;

        let pipeline = ImportPipeline::new(&state.store, state.geocoder.as_ref(), state.settings.geocode_cooldown);
        Ok::<_, ApiError>(pipeline.import(kind, mode, records).await?)
    }
    .await;

    match result {
        Ok(summary) => {
            info!(
                kind = %kind,
                mode = %mode,
                features = summary.features_written,
                dropped = summary.dropped,
                "CSV import finished"
            );
            Ok(Json(ImportResponse {
                status: "success",
                message: "CSV data imported successfully and saved to file".to_string(),
                file_path: summary.file_path.display().to_string(),
                geojson_file_path: summary.geojson_file_path.display().to_string(),
                summary,
            }))
        }
        Err(e) => {
            error!(kind = %kind, mode = %mode, "Error importing CSV data: {}", e);
            state
                .record_error(format!("Error importing {} CSV data: {}", kind, e))
                .await;
            Err(e)
        }
    }
}

/// Build map routes
pub fn map_routes() -> Router<AppState> {
    Router::new()
        .route("/map/get-customers-geojson", get(get_customers_geojson))
        .route("/map/get-technicians-geojson", get(get_technicians_geojson))
        .route("/map/get-csv-column-headers", post(get_csv_column_headers))
        .route("/map/replace-customers-csv-data", post(replace_customers))
        .route("/map/replace-technicians-csv-data", post(replace_technicians))
        .route("/map/append-customers-csv-data", post(append_customers))
        .route("/map/append-technicians-csv-data", post(append_technicians))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
