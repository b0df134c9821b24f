use crate::core::geo::{LngLat, Point};
use fxhash::FxHashMap;
use once_cell::sync::Lazy;
use serde_json::Value;

/// Pointer gestures that can be scoped to a single layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    MouseDown,
    MouseUp,
    Click,
    DblClick,
    MouseMove,
    MouseEnter,
    MouseLeave,
    MouseOver,
    MouseOut,
    ContextMenu,
}

impl GestureKind {
    pub const ALL: [GestureKind; 10] = [
        GestureKind::MouseDown,
        GestureKind::MouseUp,
        GestureKind::Click,
        GestureKind::DblClick,
        GestureKind::MouseMove,
        GestureKind::MouseEnter,
        GestureKind::MouseLeave,
        GestureKind::MouseOver,
        GestureKind::MouseOut,
        GestureKind::ContextMenu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GestureKind::MouseDown => "mousedown",
            GestureKind::MouseUp => "mouseup",
            GestureKind::Click => "click",
            GestureKind::DblClick => "dblclick",
            GestureKind::MouseMove => "mousemove",
            GestureKind::MouseEnter => "mouseenter",
            GestureKind::MouseLeave => "mouseleave",
            GestureKind::MouseOver => "mouseover",
            GestureKind::MouseOut => "mouseout",
            GestureKind::ContextMenu => "contextmenu",
        }
    }
}

/// Every event the bindings know how to route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapEventKind {
    // Camera
    MoveStart,
    Move,
    MoveEnd,
    DragStart,
    Drag,
    DragEnd,
    ZoomStart,
    Zoom,
    ZoomEnd,
    RotateStart,
    Rotate,
    RotateEnd,
    PitchStart,
    Pitch,
    PitchEnd,
    // Map lifecycle
    Wheel,
    BoxZoomStart,
    BoxZoomCancel,
    BoxZoomEnd,
    Resize,
    Load,
    Idle,
    Remove,
    Render,
    StyleData,
    SourceData,
    Error,
    DataLoading,
    StyleDataLoading,
    SourceDataLoading,
    StyleImageMissing,
    // Pointer and keyboard
    Gesture(GestureKind),
    KeyUp,
    // Popup widgets
    Open,
    Close,
    Other(String),
}

impl MapEventKind {
    pub const CAMERA: [MapEventKind; 15] = [
        MapEventKind::MoveStart,
        MapEventKind::Move,
        MapEventKind::MoveEnd,
        MapEventKind::DragStart,
        MapEventKind::Drag,
        MapEventKind::DragEnd,
        MapEventKind::ZoomStart,
        MapEventKind::Zoom,
        MapEventKind::ZoomEnd,
        MapEventKind::RotateStart,
        MapEventKind::Rotate,
        MapEventKind::RotateEnd,
        MapEventKind::PitchStart,
        MapEventKind::Pitch,
        MapEventKind::PitchEnd,
    ];

    pub const LIFECYCLE: [MapEventKind; 16] = [
        MapEventKind::Wheel,
        MapEventKind::BoxZoomStart,
        MapEventKind::BoxZoomCancel,
        MapEventKind::BoxZoomEnd,
        MapEventKind::Resize,
        MapEventKind::Load,
        MapEventKind::Idle,
        MapEventKind::Remove,
        MapEventKind::Render,
        MapEventKind::StyleData,
        MapEventKind::SourceData,
        MapEventKind::Error,
        MapEventKind::DataLoading,
        MapEventKind::StyleDataLoading,
        MapEventKind::SourceDataLoading,
        MapEventKind::StyleImageMissing,
    ];

    pub fn name(&self) -> &str {
        match self {
            MapEventKind::Other(name) => name,
            known => static_name(known),
        }
    }

    /// Parses an engine event name; unknown names become `Other`
    pub fn from_name(name: &str) -> MapEventKind {
        EVENT_NAMES
            .get(name)
            .cloned()
            .unwrap_or_else(|| MapEventKind::Other(name.to_string()))
    }

    /// Notifications after which pending readiness polls are worth re-running
    pub fn signals_readiness(&self) -> bool {
        matches!(
            self,
            MapEventKind::Load | MapEventKind::StyleData | MapEventKind::SourceData
        )
    }
}

static EVENT_NAMES: Lazy<FxHashMap<&'static str, MapEventKind>> = Lazy::new(|| {
    let mut names = FxHashMap::default();
    let known = MapEventKind::CAMERA
        .iter()
        .chain(MapEventKind::LIFECYCLE.iter())
        .cloned()
        .chain(GestureKind::ALL.iter().map(|g| MapEventKind::Gesture(*g)))
        .chain([MapEventKind::KeyUp, MapEventKind::Open, MapEventKind::Close]);
    for kind in known {
        names.insert(static_name(&kind), kind);
    }
    names
});

fn static_name(kind: &MapEventKind) -> &'static str {
    match kind {
        MapEventKind::MoveStart => "movestart",
        MapEventKind::Move => "move",
        MapEventKind::MoveEnd => "moveend",
        MapEventKind::DragStart => "dragstart",
        MapEventKind::Drag => "drag",
        MapEventKind::DragEnd => "dragend",
        MapEventKind::ZoomStart => "zoomstart",
        MapEventKind::Zoom => "zoom",
        MapEventKind::ZoomEnd => "zoomend",
        MapEventKind::RotateStart => "rotatestart",
        MapEventKind::Rotate => "rotate",
        MapEventKind::RotateEnd => "rotateend",
        MapEventKind::PitchStart => "pitchstart",
        MapEventKind::Pitch => "pitch",
        MapEventKind::PitchEnd => "pitchend",
        MapEventKind::Wheel => "wheel",
        MapEventKind::BoxZoomStart => "boxzoomstart",
        MapEventKind::BoxZoomCancel => "boxzoomcancel",
        MapEventKind::BoxZoomEnd => "boxzoomend",
        MapEventKind::Resize => "resize",
        MapEventKind::Load => "load",
        MapEventKind::Idle => "idle",
        MapEventKind::Remove => "remove",
        MapEventKind::Render => "render",
        MapEventKind::StyleData => "styledata",
        MapEventKind::SourceData => "sourcedata",
        MapEventKind::Error => "error",
        MapEventKind::DataLoading => "dataloading",
        MapEventKind::StyleDataLoading => "styledataloading",
        MapEventKind::SourceDataLoading => "sourcedataloading",
        MapEventKind::StyleImageMissing => "styleimagemissing",
        MapEventKind::Gesture(gesture) => gesture.name(),
        MapEventKind::KeyUp => "keyup",
        MapEventKind::Open => "open",
        MapEventKind::Close => "close",
        MapEventKind::Other(_) => "",
    }
}

/// Event payload handed to registered handlers
///
/// Layer-scoped gestures carry the features the engine rendered under the
/// pointer at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEvent {
    pub kind: MapEventKind,
    /// Screen position of the pointer
    pub point: Option<Point>,
    /// Geographic position under the pointer
    pub lng_lat: Option<LngLat>,
    pub features: Vec<Value>,
    /// Key name for keyboard events
    pub key: Option<String>,
    /// Bitmask of mouse buttons held during a move
    pub buttons: u8,
    /// Anything else the engine attached
    pub data: Value,
}

impl MapEvent {
    pub fn new(kind: MapEventKind) -> Self {
        Self {
            kind,
            point: None,
            lng_lat: None,
            features: Vec::new(),
            key: None,
            buttons: 0,
            data: Value::Null,
        }
    }

    pub fn gesture(gesture: GestureKind, point: Point, lng_lat: LngLat) -> Self {
        Self::new(MapEventKind::Gesture(gesture))
            .with_point(point)
            .with_lng_lat(lng_lat)
    }

    pub fn key_up(key: impl Into<String>) -> Self {
        let mut event = Self::new(MapEventKind::KeyUp);
        event.key = Some(key.into());
        event
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.point = Some(point);
        self
    }

    pub fn with_lng_lat(mut self, lng_lat: LngLat) -> Self {
        self.lng_lat = Some(lng_lat);
        self
    }

    pub fn with_features(mut self, features: Vec<Value>) -> Self {
        self.features = features;
        self
    }

    pub fn with_buttons(mut self, buttons: u8) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn gesture_kind(&self) -> Option<GestureKind> {
        match self.kind {
            MapEventKind::Gesture(gesture) => Some(gesture),
            _ => None,
        }
    }
}
