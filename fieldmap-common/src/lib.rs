//! # fieldmap Common Library
//!
//! Shared code for the fieldmap crates including:
//! - Error and result types
//! - TOML configuration and data folder resolution
//! - Domain model: entity kinds, roster records, GeoJSON point features

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{Address, EntityKind, Feature, FeatureCollection, LatLon, Record, ADDRESS_FIELDS};
