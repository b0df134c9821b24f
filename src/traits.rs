//! Engine boundary abstractions
//!
//! The imperative map engine, the image loader and the engine factory are
//! consumed through the traits in this module. Everything the binders need
//! from the outside world goes through here, so the reconciliation logic
//! never touches a concrete engine.

use crate::{
    core::geo::{LngLat, Point},
    input::events::MapEvent,
    Result,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Identifier handed out by [`MapEngine::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Identifier of an overlay widget (marker, popup, ranging label)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

/// What a listener is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Map,
    Layer(String),
    Overlay(OverlayId),
}

/// An event the engine delivered to one of our listeners
#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub listener: ListenerId,
    pub event: MapEvent,
}

/// Minimal view of a style layer entry, as returned by `getStyle().layers`
#[derive(Debug, Clone, PartialEq)]
pub struct StyleLayer {
    pub id: String,
    pub source: Option<String>,
}

/// Type-specific source update calls
#[derive(Debug, Clone, PartialEq)]
pub enum SourceUpdate {
    /// geojson `setData`
    SetData(Value),
    /// image `updateImage({url, coordinates})`
    UpdateImage { url: Value, coordinates: Value },
    /// video/canvas `setCoordinates`
    SetCoordinates(Value),
    /// vector/raster `setUrl`
    SetUrl(Value),
    /// vector/raster `setTiles`
    SetTiles(Value),
}

/// Camera options applied on every props update
#[derive(Debug, Clone, PartialEq)]
pub enum CameraOption {
    Zoom(f64),
    Pitch(f64),
    Bearing(f64),
    Center(LngLat),
}

/// Scalar map settings applied only when they change
#[derive(Debug, Clone, PartialEq)]
pub enum MapSetting {
    MinZoom(Option<f64>),
    MaxZoom(Option<f64>),
    MinPitch(Option<f64>),
    MaxBounds(Option<Value>),
    RenderWorldCopies(bool),
}

/// Options passed along with `setStyle`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOptions {
    pub diff: bool,
    pub local_ideograph_font_family: Option<String>,
}

/// Built-in interaction handlers the draw modes toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interaction {
    DragPan,
    DoubleClickZoom,
}

/// Decoded image resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Content of an overlay widget; the engine owns how it is drawn
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayContent {
    /// Host-supplied element, referenced by an opaque key
    Element(String),
    /// Small round marker placed at each ranging vertex
    RangingPoint,
    /// Floating ranging label
    RangingText(String),
    /// Control that dismisses a finished ranging line
    RangingDismiss,
    /// Popup with host-supplied content
    Popup(String),
}

/// Overlay widget description
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub lng_lat: LngLat,
    pub content: OverlayContent,
    pub offset: Point,
    pub options: Value,
}

impl Overlay {
    pub fn new(lng_lat: LngLat, content: OverlayContent) -> Self {
        Self {
            lng_lat,
            content,
            offset: Point::default(),
            options: Value::Null,
        }
    }

    pub fn with_offset(mut self, x: f64, y: f64) -> Self {
        self.offset = Point::new(x, y);
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

/// Single-attribute change to an overlay
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayUpdate {
    LngLat(LngLat),
    Offset(Value),
    Rotation(f64),
    RotationAlignment(String),
    PitchAlignment(String),
    Draggable(bool),
}

/// Host element the engine renders into
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerElement {
    pub id: String,
    pub class_name: String,
    pub children: Vec<String>,
}

impl ContainerElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Shared handle to a host element; the host keeps its own clone
pub type Container = Arc<Mutex<ContainerElement>>;

/// The imperative map engine, treated as an opaque object
///
/// Mutations that the engine may reject return `Result`; the binders decide
/// whether a rejection is surfaced or counted as an ordering violation.
pub trait MapEngine: Send {
    // Registry queries
    fn is_style_loaded(&self) -> bool;
    fn is_source_loaded(&self, id: &str) -> bool;
    fn has_source(&self, id: &str) -> bool;
    fn has_layer(&self, id: &str) -> bool;
    fn style_layers(&self) -> Vec<StyleLayer>;
    fn terrain(&self) -> Option<Value>;

    // Sources
    fn add_source(&mut self, id: &str, spec: Value) -> Result<()>;
    fn update_source(&mut self, id: &str, update: SourceUpdate) -> Result<()>;
    fn remove_source(&mut self, id: &str) -> Result<()>;

    // Layers
    fn add_layer(&mut self, spec: Value, before_id: Option<&str>) -> Result<()>;
    fn remove_layer(&mut self, id: &str) -> Result<()>;
    fn move_layer(&mut self, id: &str, before_id: Option<&str>) -> Result<()>;
    fn set_layout_property(&mut self, layer: &str, name: &str, value: Option<&Value>)
        -> Result<()>;
    fn set_paint_property(&mut self, layer: &str, name: &str, value: Option<&Value>)
        -> Result<()>;
    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<()>;
    fn set_layer_zoom_range(&mut self, layer: &str, min: Option<f64>, max: Option<f64>)
        -> Result<()>;

    // Style level
    fn set_style(&mut self, style: &Value, options: &StyleOptions) -> Result<()>;
    fn set_terrain(&mut self, terrain: Option<&Value>) -> Result<()>;
    fn set_fog(&mut self, fog: Option<&Value>) -> Result<()>;
    fn set_light(&mut self, light: &Value) -> Result<()>;
    fn set_camera_option(&mut self, option: CameraOption) -> Result<()>;
    fn set_map_setting(&mut self, setting: MapSetting) -> Result<()>;
    fn set_cursor(&mut self, cursor: &str);
    fn set_interaction(&mut self, interaction: Interaction, enabled: bool);

    // Events
    fn on(&mut self, event: &str, target: &EventTarget) -> ListenerId;
    fn off(&mut self, listener: ListenerId);
    fn drain_events(&mut self) -> Vec<EngineEvent>;
    fn query_rendered_features(&self, point: Point, layers: &[&str]) -> Vec<Value>;

    // Images
    fn has_image(&self, name: &str) -> bool;
    fn add_image(&mut self, name: &str, image: ImageData) -> Result<()>;
    fn update_image(&mut self, name: &str, image: ImageData) -> Result<()>;
    fn remove_image(&mut self, name: &str);
    fn list_images(&self) -> Vec<String>;

    // Overlay widgets
    fn add_overlay(&mut self, overlay: Overlay) -> OverlayId;
    fn update_overlay(&mut self, id: OverlayId, update: OverlayUpdate);
    fn remove_overlay(&mut self, id: OverlayId);

    // Handle lifecycle
    fn container(&self) -> Container;
    fn set_container(&mut self, container: Container);
    fn resize(&mut self);
    fn remove(&mut self);
}

/// Asynchronous image source used by `addImage`/`updateImage`
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load_image(&self, url: &str) -> Result<ImageData>;
}

/// Builds an engine handle from merged options and a container
pub trait EngineFactory {
    fn create(&self, options: Value, container: Container) -> Result<Box<dyn MapEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(Value, Container) -> Result<Box<dyn MapEngine>>,
{
    fn create(&self, options: Value, container: Container) -> Result<Box<dyn MapEngine>> {
        self(options, container)
    }
}
