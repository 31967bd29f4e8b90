//! Replace / append import of a remapped snapshot
//!
//! Both modes reconcile against the snapshot and collection that were
//! current before the upload, then demote those to the previous slot.

use chrono::{DateTime, Utc};
use fieldmap_common::{EntityKind, Error, FeatureCollection, Record, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::geocoder::Geocoder;
use super::reconciler::{Reconciler, RowOutcome};
use super::snapshot_store::{Slot, SnapshotStore};

/// How an upload combines with the stored snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upload becomes the whole snapshot
    Replace,
    /// Upload rows are added after the stored rows
    Append,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::Append => write!(f, "append"),
        }
    }
}

/// Outcome of one import, returned to the uploader
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub kind: EntityKind,
    pub mode: ImportMode,
    /// Rows in the reconciled table (after append, if any)
    pub rows: usize,
    pub features_written: usize,
    pub cache_hits: usize,
    pub geocode_calls: usize,
    pub dropped: usize,
    /// Dropped rows with their reasons
    pub drops: Vec<RowOutcome>,
    pub file_path: PathBuf,
    pub geojson_file_path: PathBuf,
    pub completed_at: DateTime<Utc>,
}

pub struct ImportPipeline<'a> {
    store: &'a SnapshotStore,
    geocoder: &'a dyn Geocoder,
    cooldown: Duration,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(store: &'a SnapshotStore, geocoder: &'a dyn Geocoder, cooldown: Duration) -> Self {
        Self {
            store,
            geocoder,
            cooldown,
        }
    }

    pub async fn import(&self, kind: EntityKind, mode: ImportMode, uploaded: Vec<Record>) -> Result<ImportSummary> {
        if mode == ImportMode::Append && uploaded.is_empty() {
            return Err(Error::InvalidInput("No data provided to append".to_string()));
        }

        info!(kind = %kind, mode = %mode, rows = uploaded.len(), "Starting import");

        let old_records = match self.store.read_records(kind, Slot::Current).await {
            Ok(records) => records,
            // Replace does not need the stored rows, so losing them only costs cache hits
            Err(e) if mode == ImportMode::Replace => {
                warn!(kind = %kind, "Stored snapshot unreadable, geocoding everything: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let old_collection = match self.store.read_collection(kind, Slot::Current).await {
            Ok(collection) => collection,
            Err(e) => {
                warn!(kind = %kind, "Stored features unreadable, geocoding everything: {}", e);
                FeatureCollection::default()
            }
        };

        self.store.demote_current(kind).await?;

        let table = match mode {
            ImportMode::Replace => uploaded,
            ImportMode::Append => {
                let mut table = old_records.clone();
                table.extend(uploaded);
                table
            }
        };

        let file_path = self.store.write_records(kind, Slot::Current, &table).await?;

        let report = Reconciler::new(self.geocoder, self.cooldown)
            .reconcile(&table, &old_records, &old_collection, kind)
            .await;

        let geojson_file_path = self
            .store
            .write_collection(kind, Slot::Current, &report.collection)
            .await?;

        let drops = report
            .outcomes
            .into_iter()
            .filter(|outcome| matches!(outcome, RowOutcome::Dropped { .. }))
            .collect();

        Ok(ImportSummary {
            kind,
            mode,
            rows: table.len(),
            features_written: report.emitted,
            cache_hits: report.cache_hits,
            geocode_calls: report.geocode_calls,
            dropped: report.dropped,
            drops,
            file_path,
            geojson_file_path,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocoder::GeocodeError;
    use crate::services::snapshot_store::StorageLayout;
    use async_trait::async_trait;
    use fieldmap_common::{Address, LatLon};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Every address resolves; the coordinate encodes the call number
    #[derive(Default)]
    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, _address: &str) -> std::result::Result<Option<LatLon>, GeocodeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(LatLon::new(n as f64, n as f64)))
        }
    }

    fn tech(id: &str, street: &str) -> Record {
        Record::new(
            id,
            format!("Tech {}", id),
            Address {
                address_one: street.into(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_replace_twice_reuses_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(StorageLayout::new(dir.path()));
        let geocoder = CountingGeocoder::default();
        let pipeline = ImportPipeline::new(&store, &geocoder, Duration::ZERO);
        let upload = vec![tech("T1", "1 Main St"), tech("T2", "2 Oak Ave")];

        let first = pipeline
            .import(EntityKind::Technician, ImportMode::Replace, upload.clone())
            .await
            .unwrap();
        assert_eq!(first.geocode_calls, 2);

        let second = pipeline
            .import(EntityKind::Technician, ImportMode::Replace, upload)
            .await
            .unwrap();
        assert_eq!(second.geocode_calls, 0);
        assert_eq!(second.cache_hits, 2);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);

        // Previous slot now holds the first generation
        let prev = store.read_collection(EntityKind::Technician, Slot::Previous).await.unwrap();
        assert_eq!(prev.len(), 2);
    }

    #[tokio::test]
    async fn test_append_reconciles_full_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(StorageLayout::new(dir.path()));
        let geocoder = CountingGeocoder::default();
        let pipeline = ImportPipeline::new(&store, &geocoder, Duration::ZERO);

        pipeline
            .import(EntityKind::Technician, ImportMode::Replace, vec![tech("T1", "1 Main St")])
            .await
            .unwrap();

        let summary = pipeline
            .import(EntityKind::Technician, ImportMode::Append, vec![tech("T2", "2 Oak Ave")])
            .await
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.features_written, 2);
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.geocode_calls, 1);

        let stored = store.read_records(EntityKind::Technician, Slot::Current).await.unwrap();
        assert_eq!(stored.len(), 2);
        let prev = store.read_records(EntityKind::Technician, Slot::Previous).await.unwrap();
        assert_eq!(prev.len(), 1);
    }

    #[tokio::test]
    async fn test_append_nothing_is_rejected_before_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(StorageLayout::new(dir.path()));
        let geocoder = CountingGeocoder::default();
        let pipeline = ImportPipeline::new(&store, &geocoder, Duration::ZERO);

        let err = pipeline
            .import(EntityKind::Customer, ImportMode::Append, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_rows_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(StorageLayout::new(dir.path()));
        let geocoder = CountingGeocoder::default();
        let pipeline = ImportPipeline::new(&store, &geocoder, Duration::ZERO);

        let summary = pipeline
            .import(
                EntityKind::Technician,
                ImportMode::Replace,
                vec![tech("T1", "1 Main St"), tech("T1", "9 Elm St")],
            )
            .await
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.features_written, 1);
        assert_eq!(summary.drops.len(), 1);
    }
}
