//! Prelude module for common maplet-sync types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use maplet_sync::prelude::*;`

pub use crate::core::{
    builder::MapPropsBuilder,
    config::{MapProps, MountIntent, SchedulerConfig},
    context::BindingContext,
    diff::{compact, diff_keys, equals, KeyDiff},
    geo::{LngLat, Point},
    map::MapInstance,
    scheduler::{CancelToken, FrameScheduler},
};

pub use crate::layers::{
    cluster::ClusterLayer,
    layer::{LayerBinder, LayerProps, LayerType},
    marker::{MarkerBinder, MarkerProps},
    path::PathLayer,
    popup::{PopupBinder, PopupProps},
    source::{SourceBinder, SourceProps, SourceType},
    track::{TrackLayer, TrackProps},
    Reconciled, ReconcileReport,
};

pub use crate::input::{
    events::{GestureKind, MapEvent, MapEventKind},
    handler::{EventCallback, HandlerTable},
};

pub use crate::plugins::{
    base::DrawMode,
    draw::{
        DrawConfig, DrawControl, DrawEvent, DrawEventKind, DrawFeature, DrawInput, DrawOptions,
        DrawStyle, ShapeKind,
    },
};

pub use crate::traits::{
    Container, ContainerElement, EngineFactory, EventTarget, ImageData, ImageLoader, MapEngine,
};

pub use crate::{Error as MapError, Result};

pub use std::sync::{Arc, Mutex, RwLock};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
