//! Snapshot ingestion: uploaded CSV + header mapping → normalized records

use fieldmap_common::{EntityKind, Error, Record, Result};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::snapshot_store::strip_bom;

/// Mapping value meaning "this target field has no source column"
pub const NOT_PROVIDED: &str = "N/A";

/// Target field → source column of the uploaded CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMapping {
    sources: HashMap<String, String>,
}

impl HeaderMapping {
    /// Parse the `headerMappings` form field
    ///
    /// A JSON `null` value is treated like [`NOT_PROVIDED`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput("Invalid JSON format".to_string());

        let value: Value = serde_json::from_str(raw).map_err(|_| invalid())?;
        let Value::Object(entries) = value else {
            return Err(invalid());
        };

        let mut sources = HashMap::with_capacity(entries.len());
        for (target, source) in entries {
            match source {
                Value::String(column) => {
                    sources.insert(target, column);
                }
                Value::Null => {
                    sources.insert(target, NOT_PROVIDED.to_string());
                }
                _ => return Err(invalid()),
            }
        }
        Ok(Self { sources })
    }

    pub fn insert(&mut self, target: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(target.into(), source.into());
    }

    /// Source column for `target`, `None` when unmapped or [`NOT_PROVIDED`]
    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.sources
            .get(target)
            .map(String::as_str)
            .filter(|source| *source != NOT_PROVIDED)
    }

    fn targets(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

/// Header row of an uploaded CSV
pub fn csv_column_headers(upload: &[u8]) -> Result<Vec<String>> {
    let mut reader = upload_reader(upload)?;
    let headers = read_headers(&mut reader)?;
    Ok(headers)
}

/// Remap an uploaded CSV onto the target fields of `kind`
///
/// Every mapped source column must exist in the upload; any problem with the
/// upload itself fails the whole batch before anything is stored.
pub fn remap_upload(upload: &[u8], mapping: &HeaderMapping, kind: EntityKind) -> Result<Vec<Record>> {
    let mut reader = upload_reader(upload)?;
    let headers = read_headers(&mut reader)?;

    for target in mapping.targets() {
        if !kind.is_target_field(target) {
            debug!(field = %target, "Ignoring mapping for unknown {} field", kind);
        }
    }

    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for target in kind.target_fields() {
        let Some(source) = mapping.source_for(target) else {
            continue;
        };
        let index = headers
            .iter()
            .position(|header| header == source)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "column '{}' (mapped to {}) not found in uploaded CSV",
                    source, target
                ))
            })?;
        columns.insert(target, index);
    }

    let mut records = Vec::new();
    for (row_number, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            Error::InvalidInput(format!("Malformed CSV at data row {}: {}", row_number + 1, e))
        })?;
        records.push(Record::from_cells(kind, |field| {
            columns.get(field).and_then(|&i| row.get(i))
        }));
    }

    debug!(rows = records.len(), "Remapped {} upload", kind);
    Ok(records)
}

fn upload_reader(upload: &[u8]) -> Result<csv::Reader<&[u8]>> {
    let bytes = strip_bom(upload);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::InvalidInput("CSV is empty".to_string()));
    }
    std::str::from_utf8(bytes)
        .map_err(|_| Error::InvalidInput("CSV upload is not valid UTF-8".to_string()))?;

    Ok(csv::ReaderBuilder::new().flexible(true).from_reader(bytes))
}

fn read_headers(reader: &mut csv::Reader<&[u8]>) -> Result<Vec<String>> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Unreadable CSV header row: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(Error::InvalidInput("CSV is empty".to_string()));
    }
    Ok(headers)
}
