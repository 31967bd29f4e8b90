//! GeoJSON point features
//!
//! Only the subset the map front end consumes is modelled: a
//! `FeatureCollection` of `Point` features with a free-form properties bag.
//! Geometry and coordinates are parsed leniently (a null geometry, null
//! properties or odd coordinates all load) so that one malformed stored
//! feature does not make the whole file unreadable.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

const FEATURE_COLLECTION: &str = "FeatureCollection";
const FEATURE: &str = "Feature";
const POINT: &str = "Point";

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default)]
    pub geometry_type: String,
    #[serde(default)]
    pub coordinates: Value,
}

impl Geometry {
    /// GeoJSON order: `[lon, lat]`
    pub fn point(coordinate: LatLon) -> Self {
        Self {
            geometry_type: POINT.to_string(),
            coordinates: json!([coordinate.lon, coordinate.lat]),
        }
    }

    /// Coordinate of a well-formed point, `None` otherwise
    pub fn as_point(&self) -> Option<LatLon> {
        if self.geometry_type != POINT {
            return None;
        }
        let pair = self.coordinates.as_array()?;
        if pair.len() < 2 {
            return None;
        }
        let lon = pair[0].as_f64()?;
        let lat = pair[1].as_f64()?;
        Some(LatLon { lat, lon })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub feature_type: String,
    /// `null` in GeoJSON for a feature without a location
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
}

fn feature_type() -> String {
    FEATURE.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Feature {
    pub fn point(coordinate: LatLon, properties: Map<String, Value>) -> Self {
        Self {
            feature_type: feature_type(),
            geometry: Some(Geometry::point(coordinate)),
            properties,
        }
    }

    pub fn coordinate(&self) -> Option<LatLon> {
        self.geometry.as_ref()?.as_point()
    }

    /// Property rendered as a string; numbers are accepted as well since
    /// older files may carry numeric identifiers
    pub fn property_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub collection_type: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

fn feature_collection_type() -> String {
    FEATURE_COLLECTION.to_string()
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: feature_collection_type(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
