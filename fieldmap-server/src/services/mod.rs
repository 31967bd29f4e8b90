//! Service modules for roster ingest and spatial queries
//!
//! Leaves first: storage and provider gateways, then ingestion and
//! reconciliation, then the query services built on stored features.

pub mod geocoder;
pub mod import_pipeline;
pub mod ingestion;
pub mod legend_store;
pub mod nearest_technicians;
pub mod reconciler;
pub mod routing_client;
pub mod snapshot_store;
pub mod spatial;
pub mod unconfigured;

pub use geocoder::{GeocodeError, Geocoder, TomTomGeocoder};
pub use import_pipeline::{ImportMode, ImportPipeline, ImportSummary};
pub use ingestion::{csv_column_headers, remap_upload, HeaderMapping, NOT_PROVIDED};
pub use legend_store::{LegendColors, LegendStore};
pub use nearest_technicians::{nearest_technicians, Bottleneck, NearestQuery, TechnicianMatch};
pub use reconciler::{CoordinateSource, DropReason, GeocodeReason, ReconcileReport, Reconciler, RowOutcome};
pub use routing_client::{RouteSummary, RoutingError, RoutingProvider, TomTomRouting, TravelBudget, METERS_PER_MILE};
pub use snapshot_store::{Slot, SnapshotStore, StorageLayout};
pub use spatial::{geofence_density, Geofence, GeofenceDensity};
pub use unconfigured::Unconfigured;
