//! Declared map props and tuning knobs
//!
//! `MapProps` is the desired state of one map instance as the host declares
//! it. Engine passthrough options ride along untyped in `options`; everything
//! the instance itself reconciles has a typed field.

use crate::{core::geo::LngLat, input::handler::HandlerTable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a mount asks for when it starts up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountIntent {
    /// Build a fresh engine handle
    #[default]
    Create,
    /// Take a pooled instance if there is one, otherwise create
    Reuse,
    /// Borrow a pooled instance without ever creating one
    Canuse,
}

/// Desired state of a map instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapProps {
    // Camera
    pub zoom: Option<f64>,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
    pub center: Option<LngLat>,

    // Scalar settings
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub min_pitch: Option<f64>,
    pub max_bounds: Option<Value>,
    pub render_world_copies: Option<bool>,

    // Style
    pub map_style: Option<Value>,
    pub diff: Option<bool>,
    pub local_ideograph_font_family: Option<String>,
    pub cursor: Option<String>,

    pub fog: Option<Value>,
    pub light: Option<Value>,
    pub terrain: Option<Value>,

    pub reuse: bool,
    pub canuse: bool,

    /// Extra constructor options handed to the engine untouched
    #[serde(flatten)]
    pub options: Map<String, Value>,

    /// Camera and lifecycle callbacks
    #[serde(skip)]
    pub handlers: HandlerTable,
}

impl MapProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intent(&self) -> MountIntent {
        if self.canuse {
            MountIntent::Canuse
        } else if self.reuse {
            MountIntent::Reuse
        } else {
            MountIntent::Create
        }
    }

    /// Source the declared terrain is bound to
    pub fn terrain_source(&self) -> Option<&str> {
        self.terrain
            .as_ref()
            .and_then(|terrain| terrain.get("source"))
            .and_then(Value::as_str)
    }

    /// Constructor options: passthrough options merged with the typed fields
    ///
    /// `mapStyle` is renamed to the engine's `style` key and null entries are
    /// dropped.
    pub fn engine_options(&self) -> crate::Result<Value> {
        let mut merged = self.options.clone();
        let typed = serde_json::to_value(self)?;
        if let Value::Object(typed) = typed {
            for (key, value) in typed {
                if value.is_null() || matches!(key.as_str(), "reuse" | "canuse") {
                    continue;
                }
                let key = if key == "mapStyle" {
                    "style".to_string()
                } else {
                    key
                };
                merged.insert(key, value);
            }
        }
        Ok(Value::Object(merged))
    }
}

/// Bounds for poll-until-ready waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Frames a readiness poll may run before it is abandoned
    pub max_poll_frames: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        // Roughly ten seconds at 60 fps
        Self {
            max_poll_frames: 600,
        }
    }
}
