//! Snapshot store
//!
//! Per entity kind the data folder holds a (current, previous) pair of CSV
//! snapshots and a (current, previous) pair of GeoJSON feature collections.
//! Writes are whole-file overwrites.

use fieldmap_common::{EntityKind, Error, FeatureCollection, Record, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which generation of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Current,
    Previous,
}

/// File names under the data folder
#[derive(Debug, Clone)]
pub struct StorageLayout {
    data_folder: PathBuf,
}

impl StorageLayout {
    pub fn new(data_folder: impl Into<PathBuf>) -> Self {
        Self {
            data_folder: data_folder.into(),
        }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// `technicians_curr.csv` / `technicians_prev.csv`
    pub fn csv_path(&self, kind: EntityKind, slot: Slot) -> PathBuf {
        let suffix = match slot {
            Slot::Current => "curr",
            Slot::Previous => "prev",
        };
        self.data_folder
            .join(format!("{}_{}.csv", kind.plural(), suffix))
    }

    /// `technicians_data.json` / `technicians_data_prev.json`
    pub fn geojson_path(&self, kind: EntityKind, slot: Slot) -> PathBuf {
        let name = match slot {
            Slot::Current => format!("{}_data.json", kind.plural()),
            Slot::Previous => format!("{}_data_prev.json", kind.plural()),
        };
        self.data_folder.join(name)
    }

    pub fn legend_config_path(&self) -> PathBuf {
        self.data_folder.join("map_legend_config.json")
    }
}

/// Durable CSV and GeoJSON snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    layout: StorageLayout,
}

impl SnapshotStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Stored records of a slot; a missing file is an empty snapshot
    pub async fn read_records(&self, kind: EntityKind, slot: Slot) -> Result<Vec<Record>> {
        let path = self.layout.csv_path(kind, slot);
        let Some(bytes) = read_optional(&path).await? else {
            debug!(path = %path.display(), "No stored snapshot");
            return Ok(Vec::new());
        };
        parse_records(&bytes, kind)
    }

    /// Overwrite a slot with `records`, header row first
    pub async fn write_records(&self, kind: EntityKind, slot: Slot, records: &[Record]) -> Result<PathBuf> {
        let path = self.layout.csv_path(kind, slot);
        let bytes = serialize_records(records, kind)?;
        ensure_parent(&path).await?;
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), rows = records.len(), "Wrote {} snapshot", kind);
        Ok(path)
    }

    /// Stored collection of a slot; a missing file is an empty collection
    pub async fn read_collection(&self, kind: EntityKind, slot: Slot) -> Result<FeatureCollection> {
        let path = self.layout.geojson_path(kind, slot);
        match read_optional(&path).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(FeatureCollection::default()),
        }
    }

    /// Overwrite a slot with `collection`, pretty-printed
    pub async fn write_collection(
        &self,
        kind: EntityKind,
        slot: Slot,
        collection: &FeatureCollection,
    ) -> Result<PathBuf> {
        let path = self.layout.geojson_path(kind, slot);
        let bytes = serde_json::to_vec_pretty(collection)?;
        ensure_parent(&path).await?;
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), features = collection.len(), "Wrote {} features", kind);
        Ok(path)
    }

    /// Copy current → previous for both the CSV and the GeoJSON
    ///
    /// When a current file does not exist the previous one is removed, so the
    /// previous slot never outlives the generation it belonged to.
    pub async fn demote_current(&self, kind: EntityKind) -> Result<()> {
        demote_file(
            &self.layout.csv_path(kind, Slot::Current),
            &self.layout.csv_path(kind, Slot::Previous),
        )
        .await?;
        demote_file(
            &self.layout.geojson_path(kind, Slot::Current),
            &self.layout.geojson_path(kind, Slot::Previous),
        )
        .await
    }
}

/// Parse a stored snapshot; columns are matched by header name
pub(crate) fn parse_records(bytes: &[u8], kind: EntityKind) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(strip_bom(bytes));

    let headers: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(Record::from_cells(kind, |field| {
            headers.get(field).and_then(|&i| row.get(i))
        }));
    }
    Ok(records)
}

pub(crate) fn serialize_records(records: &[Record], kind: EntityKind) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(kind.target_fields())?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV buffer flush failed: {}", e)))
}

pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

async fn demote_file(current: &Path, previous: &Path) -> Result<()> {
    match tokio::fs::copy(current, previous).await {
        Ok(_) => {
            debug!(from = %current.display(), to = %previous.display(), "Demoted snapshot");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            match tokio::fs::remove_file(previous).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldmap_common::{Address, Feature, LatLon};
    use serde_json::Map;

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(StorageLayout::new(dir.path()));
        (dir, store)
    }

    fn tech(id: &str, city: &str) -> Record {
        Record::new(
            id,
            format!("Tech {}", id),
            Address {
                address_one: "1 Main St".into(),
                city: city.into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_layout_file_names() {
        let layout = StorageLayout::new("/data");
        assert_eq!(
            layout.csv_path(EntityKind::Customer, Slot::Current),
            PathBuf::from("/data/customers_curr.csv")
        );
        assert_eq!(
            layout.csv_path(EntityKind::Technician, Slot::Previous),
            PathBuf::from("/data/technicians_prev.csv")
        );
        assert_eq!(
            layout.geojson_path(EntityKind::Technician, Slot::Current),
            PathBuf::from("/data/technicians_data.json")
        );
        assert_eq!(
            layout.geojson_path(EntityKind::Customer, Slot::Previous),
            PathBuf::from("/data/customers_data_prev.json")
        );
        assert_eq!(layout.legend_config_path(), PathBuf::from("/data/map_legend_config.json"));
    }

    #[tokio::test]
    async fn test_records_persist_with_header_row() {
        let (_dir, store) = store();
        let records = vec![tech("T1", "Springfield"), tech("T2", "Peoria")];
        let path = store
            .write_records(EntityKind::Technician, Slot::Current, &records)
            .await
            .unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("id,name,address_one,address_two,city,state,zipcode,country\n"));

        let loaded = store.read_records(EntityKind::Technician, Slot::Current).await.unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let (_dir, store) = store();
        assert!(store.read_records(EntityKind::Customer, Slot::Current).await.unwrap().is_empty());
        assert!(store.read_collection(EntityKind::Customer, Slot::Previous).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_demote_copies_and_clears() {
        let (_dir, store) = store();
        let kind = EntityKind::Technician;
        let fc = FeatureCollection::new(vec![Feature::point(LatLon::new(1.0, 2.0), Map::new())]);

        store.write_records(kind, Slot::Current, &[tech("T1", "A")]).await.unwrap();
        store.write_collection(kind, Slot::Current, &fc).await.unwrap();
        store.demote_current(kind).await.unwrap();

        assert_eq!(store.read_records(kind, Slot::Previous).await.unwrap().len(), 1);
        assert_eq!(store.read_collection(kind, Slot::Previous).await.unwrap(), fc);

        // Nothing current: the previous generation goes away too
        std::fs::remove_file(store.layout().csv_path(kind, Slot::Current)).unwrap();
        std::fs::remove_file(store.layout().geojson_path(kind, Slot::Current)).unwrap();
        store.demote_current(kind).await.unwrap();
        assert!(!store.layout().csv_path(kind, Slot::Previous).exists());
        assert!(!store.layout().geojson_path(kind, Slot::Previous).exists());
    }

    #[test]
    fn test_parse_tolerates_bom_and_extra_columns() {
        let raw = b"\xEF\xBB\xBFcnum,name,notes,city\nC1,Acme,vip,Peoria\n";
        let records = parse_records(raw, EntityKind::Customer).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier.as_deref(), Some("C1"));
        assert_eq!(records[0].address.city, "Peoria");
        assert_eq!(records[0].address.zipcode, "");
    }
}
