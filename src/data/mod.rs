//! GeoJSON data model shared by the draw control and its exports

pub mod geojson;

pub use geojson::{CoordPath, Feature, GeoJson, Geometry};
