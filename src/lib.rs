//! # maplet-sync
//!
//! Declarative bindings that keep a retained component tree (map, sources,
//! layers, markers, popups, drawing tools) in sync with an imperative map
//! engine.
//!
//! Binders diff the declared props against the live engine state and issue
//! the minimal set of add/update/remove calls. The map instance owns the
//! engine handle, its event forwarding and the frame scheduler that gates
//! mutations on the engine's load lifecycle. The draw control layers an
//! interactive shape state machine on top.

pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod plugins;
pub mod prelude;
pub mod testing;
pub mod traits;

// Re-export public API
pub use crate::core::{
    config::{MapProps, MountIntent, SchedulerConfig},
    context::BindingContext,
    diff::{diff_keys, equals, KeyDiff},
    geo::{LngLat, Point},
    map::MapInstance,
    scheduler::{CancelToken, FrameScheduler},
};

pub use layers::{
    cluster::ClusterLayer, layer::LayerBinder, marker::MarkerBinder, path::PathLayer,
    popup::PopupBinder, source::SourceBinder, track::TrackLayer, Reconciled, ReconcileReport,
};

pub use input::events::{GestureKind, MapEvent, MapEventKind};

pub use plugins::{
    base::DrawMode,
    draw::{DrawControl, DrawEvent, DrawEventKind, DrawFeature, DrawOptions, ShapeKind},
};

pub use traits::{EngineFactory, ImageLoader, MapEngine};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("cannot update source of type `{0}`")]
    InvalidSourceType(String),

    #[error("resource ordering violation: {0}")]
    OrderingViolation(String),

    #[error("engine rejected {op}: {reason}")]
    Engine { op: &'static str, reason: String },

    #[error("image `{0}` does not exist")]
    ImageNotFound(String),

    #[error("failed to load image `{name}`: {reason}")]
    ImageLoad { name: String, reason: String },

    #[error("draw error: {0}")]
    Draw(String),

    #[error("no draw mode registered as `{0}`")]
    ModeNotFound(String),

    #[error("gave up waiting for `{0}`")]
    ReadyTimeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MapError {
    pub(crate) fn engine(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Engine {
            op,
            reason: reason.into(),
        }
    }
}

/// Error type alias for convenience
pub type Error = MapError;
