//! CSV-to-GeoJSON reconciliation
//!
//! Derives the new feature collection for a snapshot from the previous
//! snapshot and its collection, geocoding only what cannot be reused.
//!
//! Per row, in input order:
//! 1. Admission: a missing or already-seen identifier drops the row.
//! 2. Resolution: same identifier and same six address components as the
//!    previous snapshot, with a cached feature → reuse its coordinate.
//!    Anything else is geocoded; every geocode call is followed by the
//!    cool-down, whether it succeeded or not.
//! 3. Emission: a point feature carrying the record's fields.
//!
//! Row problems never abort the batch; they show up as
//! [`RowOutcome::Dropped`] in the report.

use fieldmap_common::{EntityKind, Feature, FeatureCollection, LatLon, Record, ADDRESS_FIELDS};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::geocoder::Geocoder;

/// Why a record had to be geocoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeReason {
    /// Unchanged record, but the previous collection has no feature for it
    CacheGap,
    /// Known identifier with a different address
    AddressChanged,
    /// Identifier absent from the previous snapshot
    NewIdentity,
}

/// Where an emitted coordinate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum CoordinateSource {
    Cached,
    Geocoded(GeocodeReason),
}

/// Why a row produced no feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DropReason {
    MissingIdentifier,
    DuplicateIdentifier,
    /// The geocoder had no match for the address
    NotFound,
    /// The geocoder call itself failed
    GeocodeFailed(String),
    /// The cached feature for an unchanged record has unusable geometry
    MalformedCachedFeature,
}

/// Result of one input row; `row` is the 0-based input position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Emitted {
        row: usize,
        identifier: String,
        source: CoordinateSource,
    },
    Dropped {
        row: usize,
        identifier: Option<String>,
        reason: DropReason,
    },
}

/// New collection plus per-row outcomes and counters
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub collection: FeatureCollection,
    pub outcomes: Vec<RowOutcome>,
    pub emitted: usize,
    pub cache_hits: usize,
    pub geocode_calls: usize,
    pub dropped: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: RowOutcome) {
        match &outcome {
            RowOutcome::Emitted { source, .. } => {
                self.emitted += 1;
                if *source == CoordinateSource::Cached {
                    self.cache_hits += 1;
                }
            }
            RowOutcome::Dropped { .. } => self.dropped += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// What to do for an admitted row
#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolution {
    Reuse(LatLon),
    Geocode(GeocodeReason),
    MalformedCache,
}

/// Previous snapshot and collection, indexed by identifier (first entry wins)
struct History<'a> {
    records: HashMap<&'a str, &'a Record>,
    features: HashMap<String, &'a Feature>,
}

impl<'a> History<'a> {
    fn new(old_records: &'a [Record], old_collection: &'a FeatureCollection, kind: EntityKind) -> Self {
        let mut records = HashMap::with_capacity(old_records.len());
        for record in old_records {
            if let Some(id) = record.identifier.as_deref() {
                records.entry(id).or_insert(record);
            }
        }

        let mut features = HashMap::with_capacity(old_collection.len());
        for feature in &old_collection.features {
            if let Some(id) = feature.property_str(kind.id_field()) {
                features.entry(id).or_insert(feature);
            }
        }

        Self { records, features }
    }

    fn resolve(&self, identifier: &str, record: &Record) -> Resolution {
        match self.records.get(identifier) {
            Some(old) if old.address == record.address => match self.features.get(identifier) {
                Some(feature) => match feature.coordinate() {
                    Some(coordinate) => Resolution::Reuse(coordinate),
                    None => Resolution::MalformedCache,
                },
                None => Resolution::Geocode(GeocodeReason::CacheGap),
            },
            Some(_) => Resolution::Geocode(GeocodeReason::AddressChanged),
            None => Resolution::Geocode(GeocodeReason::NewIdentity),
        }
    }
}

/// Reconciliation engine
pub struct Reconciler<'g> {
    geocoder: &'g dyn Geocoder,
    cooldown: Duration,
}

impl<'g> Reconciler<'g> {
    pub fn new(geocoder: &'g dyn Geocoder, cooldown: Duration) -> Self {
        Self { geocoder, cooldown }
    }

    /// Build the collection for `new_records`
    ///
    /// `old_records` / `old_collection` are the snapshot and collection that
    /// were current before this upload.
    pub async fn reconcile(
        &self,
        new_records: &[Record],
        old_records: &[Record],
        old_collection: &FeatureCollection,
        kind: EntityKind,
    ) -> ReconcileReport {
        let history = History::new(old_records, old_collection, kind);
        let mut admitted: HashSet<&str> = HashSet::with_capacity(new_records.len());
        let mut report = ReconcileReport::default();
        let mut features = Vec::with_capacity(new_records.len());

        for (row, record) in new_records.iter().enumerate() {
            let identifier = match admit(record, &mut admitted) {
                Ok(identifier) => identifier,
                Err(reason) => {
                    warn!(row, identifier = ?record.identifier, reason = ?reason, "Dropping {} row", kind);
                    report.record(RowOutcome::Dropped {
                        row,
                        identifier: record.identifier.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let resolved = match history.resolve(identifier, record) {
                Resolution::Reuse(coordinate) => {
                    debug!(row, identifier = %identifier, "Reusing cached coordinate");
                    Ok((coordinate, CoordinateSource::Cached))
                }
                Resolution::MalformedCache => Err(DropReason::MalformedCachedFeature),
                Resolution::Geocode(reason) => {
                    info!(row, identifier = %identifier, reason = ?reason, "Geocoding {}", kind);
                    report.geocode_calls += 1;
                    self.geocode(&record.full_address())
                        .await
                        .map(|coordinate| (coordinate, CoordinateSource::Geocoded(reason)))
                }
            };

            match resolved {
                Ok((coordinate, source)) => {
                    features.push(Feature::point(coordinate, properties(record, identifier, kind)));
                    report.record(RowOutcome::Emitted {
                        row,
                        identifier: identifier.to_string(),
                        source,
                    });
                }
                Err(reason) => {
                    warn!(row, identifier = %identifier, reason = ?reason, "Dropping {} row", kind);
                    report.record(RowOutcome::Dropped {
                        row,
                        identifier: Some(identifier.to_string()),
                        reason,
                    });
                }
            }
        }

        report.collection = FeatureCollection::new(features);
        info!(
            kind = %kind,
            rows = new_records.len(),
            emitted = report.emitted,
            cache_hits = report.cache_hits,
            geocode_calls = report.geocode_calls,
            dropped = report.dropped,
            "Reconciliation complete"
        );
        report
    }

    /// One geocode call followed by the cool-down
    async fn geocode(&self, address: &str) -> Result<LatLon, DropReason> {
        let result = self.geocoder.geocode(address).await;

        if !self.cooldown.is_zero() {
            tokio::time::sleep(self.cooldown).await;
        }

        match result {
            Ok(Some(coordinate)) => Ok(coordinate),
            Ok(None) => Err(DropReason::NotFound),
            Err(e) => Err(DropReason::GeocodeFailed(e.to_string())),
        }
    }
}

/// First write wins
fn admit<'r>(record: &'r Record, admitted: &mut HashSet<&'r str>) -> Result<&'r str, DropReason> {
    let identifier = record
        .identifier
        .as_deref()
        .ok_or(DropReason::MissingIdentifier)?;
    if !admitted.insert(identifier) {
        return Err(DropReason::DuplicateIdentifier);
    }
    Ok(identifier)
}

/// `{<id field>, name, address_one, …, country}`
fn properties(record: &Record, identifier: &str, kind: EntityKind) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(kind.id_field().to_string(), Value::from(identifier));
    props.insert("name".to_string(), Value::from(record.name.as_str()));
    for field in ADDRESS_FIELDS {
        let value = record.address.get(field).unwrap_or_default();
        props.insert(field.to_string(), Value::from(value));
    }
    props
}
