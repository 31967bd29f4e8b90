//! Domain model shared by the fieldmap crates

pub mod feature;
pub mod record;

pub use feature::{Feature, FeatureCollection, Geometry, LatLon};
pub use record::{Address, EntityKind, Record, ADDRESS_FIELDS};
