//! Drawing tools layered on the map engine

pub mod base;
pub mod draw;
pub mod measure;
