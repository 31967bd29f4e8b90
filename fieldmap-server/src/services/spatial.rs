//! Spatial queries over stored point features
//!
//! Distances and areas are geodesic (WGS84 ellipsoid) via `geo`.

use fieldmap_common::{Error, Feature, FeatureCollection, LatLon, Result};
use geo::{Contains, GeodesicArea, GeodesicDistance, LineString, Point, Polygon};
use serde::Serialize;

const METERS_PER_MILE: f64 = 1609.344;
const SQUARE_METERS_PER_SQUARE_MILE: f64 = METERS_PER_MILE * METERS_PER_MILE;

fn to_point(coordinate: LatLon) -> Point<f64> {
    Point::new(coordinate.lon, coordinate.lat)
}

/// Geodesic distance in statute miles
pub fn geodesic_miles(a: LatLon, b: LatLon) -> f64 {
    to_point(a).geodesic_distance(&to_point(b)) / METERS_PER_MILE
}

/// Features within `radius_miles` of `center` (inclusive), with their coordinate
///
/// Features without a usable point geometry are skipped.
pub fn within_radius(
    collection: &FeatureCollection,
    center: LatLon,
    radius_miles: f64,
) -> Vec<(&Feature, LatLon)> {
    collection
        .features
        .iter()
        .filter_map(|feature| feature.coordinate().map(|c| (feature, c)))
        .filter(|(_, coordinate)| geodesic_miles(center, *coordinate) <= radius_miles)
        .collect()
}

/// User-drawn polygon
#[derive(Debug, Clone)]
pub struct Geofence {
    polygon: Polygon<f64>,
}

impl Geofence {
    /// Build from an exterior ring of `[lon, lat]` pairs; the ring is closed
    /// automatically
    pub fn from_ring(ring: &[[f64; 2]]) -> Result<Self> {
        if ring.len() < 3 {
            return Err(Error::InvalidInput(
                "Geofence needs at least 3 coordinates".to_string(),
            ));
        }
        if !ring.iter().all(|&[lon, lat]| LatLon::new(lat, lon).is_valid()) {
            return Err(Error::InvalidInput(
                "Geofence coordinates must be longitudes in [-180, 180] and latitudes in [-90, 90]"
                    .to_string(),
            ));
        }
        let exterior: LineString<f64> = ring.iter().map(|&[lon, lat]| (lon, lat)).collect();
        Ok(Self {
            polygon: Polygon::new(exterior, vec![]),
        })
    }

    /// Strictly inside; points on the boundary do not count
    pub fn contains(&self, coordinate: LatLon) -> bool {
        self.polygon.contains(&to_point(coordinate))
    }

    /// Features of `collection` inside the fence
    pub fn count_within(&self, collection: &FeatureCollection) -> usize {
        collection
            .features
            .iter()
            .filter_map(Feature::coordinate)
            .filter(|c| self.contains(*c))
            .count()
    }

    /// Geodesic area, independent of ring orientation
    pub fn area_square_miles(&self) -> f64 {
        self.polygon.geodesic_area_signed().abs() / SQUARE_METERS_PER_SQUARE_MILE
    }
}

/// `count / area * 100`, 0 for a degenerate area
pub fn density_per_100_sq_miles(count: usize, area_square_miles: f64) -> f64 {
    if area_square_miles > 0.0 {
        count as f64 / area_square_miles * 100.0
    } else {
        0.0
    }
}

/// Counts and densities inside a geofence
///
/// The density keys keep the names the map front end reads; the values are
/// per 100 square miles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceDensity {
    pub customer_count: usize,
    pub technician_count: usize,
    pub customer_density_per_10_mile2: f64,
    pub technician_density_per_10_mile2: f64,
    pub area_square_miles: f64,
}

pub fn geofence_density(
    fence: &Geofence,
    technicians: &FeatureCollection,
    customers: &FeatureCollection,
) -> GeofenceDensity {
    let area = fence.area_square_miles();
    let technician_count = fence.count_within(technicians);
    let customer_count = fence.count_within(customers);

    GeofenceDensity {
        customer_count,
        technician_count,
        customer_density_per_10_mile2: density_per_100_sq_miles(customer_count, area),
        technician_density_per_10_mile2: density_per_100_sq_miles(technician_count, area),
        area_square_miles: area,
    }
}
