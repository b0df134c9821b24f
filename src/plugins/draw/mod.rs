//! Interactive drawing control
//!
//! [`DrawControl`] owns the drawn features, the active [`DrawMode`] and the
//! ranging overlays. Engine pointer and key events are translated into
//! [`DrawInput`]s and handed to the active mode; after every input the
//! control applies requested mode changes, runs its creation and selection
//! hooks, publishes [`DrawEvent`]s and re-renders the draw source.

pub mod feature;
pub mod modes;
pub mod store;

pub use crate::plugins::base::DrawInput;
pub use feature::{DrawFeature, Grip, ShapeKind};

use crate::{
    core::diff::{as_map, compact},
    data::geojson::{Feature, GeoJson},
    plugins::{
        base::{dispatch, DrawMode, ModeChange, ModeContext, ModeOptions},
        draw::{
            modes::{simple_select::SimpleSelectMode, DIRECT_SELECT, SIMPLE_SELECT},
            store::FeatureStore,
        },
        measure::RangingRegistry,
    },
    traits::{EventTarget, ListenerId, MapEngine, SourceUpdate},
    MapError, Result,
};
use crossbeam_channel::{Receiver, Sender};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{fmt, sync::Arc};

/// Builds a fresh mode each time it is entered
pub type ModeFactory = Arc<dyn Fn(&ModeOptions) -> Box<dyn DrawMode> + Send + Sync>;

/// Engine events the control listens to on the map
const INPUT_EVENTS: [&str; 6] = ["mousedown", "mouseup", "mousemove", "click", "dblclick", "keyup"];

/// Upper bound on hook-triggered mode changes handled for one input
const MAX_SETTLE_ROUNDS: usize = 8;

const FILL_LAYER: &str = "maplet-draw-fill";
const LINE_LAYER: &str = "maplet-draw-line";
const POINT_LAYER: &str = "maplet-draw-point";
const VERTEX_LAYER: &str = "maplet-draw-vertex";

#[derive(Debug, Clone)]
pub struct DrawConfig {
    /// Hit radius for features and handles, in degrees
    pub hit_tolerance: f64,
    /// Ring segments of a circle approximation
    pub circle_steps: usize,
    pub arrow_head_km: f64,
    /// Angle between the shaft and each head stroke
    pub arrow_spread_deg: f64,
    /// Source holding the rendered features
    pub source_id: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            hit_tolerance: 0.0005,
            circle_steps: 64,
            arrow_head_km: 0.0321869,
            arrow_spread_deg: 30.0,
            source_id: "maplet-draw".to_string(),
        }
    }
}

/// Paint values copied onto a feature's properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawStyle {
    pub fill_color: Option<String>,
    pub fill_outline_color: Option<String>,
    pub fill_opacity: Option<f64>,
    pub line_width: Option<f64>,
    pub line_color: Option<String>,
    pub line_opacity: Option<f64>,
    pub vertex_color: Option<String>,
    pub vertex_radius: Option<f64>,
    pub circle_color: Option<String>,
    pub circle_radius: Option<f64>,
    pub circle_opacity: Option<f64>,
}

impl DrawStyle {
    /// Set keys only
    pub fn properties(&self) -> Map<String, Value> {
        serde_json::to_value(self)
            .map(|value| compact(&as_map(Some(&value))))
            .unwrap_or_default()
    }
}

/// Options of one drawing session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawOptions {
    /// Measure the line while it is drawn
    pub ranging: bool,
    pub style: DrawStyle,
    /// A new circle replaces the previous one
    #[serde(rename = "override")]
    pub override_previous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawEventKind {
    Create,
    Update,
    Delete,
    SelectionChange,
}

impl DrawEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            DrawEventKind::Create => "draw.create",
            DrawEventKind::Update => "draw.update",
            DrawEventKind::Delete => "draw.delete",
            DrawEventKind::SelectionChange => "draw.selectionchange",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawEvent {
    pub kind: DrawEventKind,
    pub features: Vec<DrawFeature>,
    /// `move` or `change_coordinates` for updates
    pub action: Option<String>,
}

/// Builds a [`ModeContext`] from disjoint fields so the active mode can be
/// borrowed alongside it
macro_rules! mode_context {
    ($control:ident, $engine:expr) => {
        ModeContext {
            engine: $engine,
            store: &mut $control.store,
            ranging: &mut $control.ranging,
            config: &$control.config,
            last_circle: &mut $control.last_circle,
            events: &mut $control.pending,
            change: &mut $control.change,
        }
    };
}

pub struct DrawControl {
    config: DrawConfig,
    modes: FxHashMap<String, ModeFactory>,
    mode: Box<dyn DrawMode>,
    store: FeatureStore,
    ranging: RangingRegistry,
    last_circle: Option<String>,
    options: DrawOptions,
    listeners: Vec<ListenerId>,
    pending: Vec<DrawEvent>,
    change: Option<ModeChange>,
    sender: Sender<DrawEvent>,
    receiver: Receiver<DrawEvent>,
    rendered: Option<Value>,
}

impl DrawControl {
    pub fn new(config: DrawConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            config,
            modes: modes::builtin()
                .into_iter()
                .map(|(name, factory)| (name.to_string(), factory))
                .collect(),
            mode: Box::new(SimpleSelectMode::new(&ModeOptions::default())),
            store: FeatureStore::new(),
            ranging: RangingRegistry::new(),
            last_circle: None,
            options: DrawOptions::default(),
            listeners: Vec::new(),
            pending: Vec::new(),
            change: None,
            sender,
            receiver,
            rendered: None,
        }
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    /// Starts listening to pointer and key events on the map
    pub fn attach(&mut self, engine: &mut dyn MapEngine) {
        if !self.listeners.is_empty() {
            return;
        }
        for event in INPUT_EVENTS {
            self.listeners.push(engine.on(event, &EventTarget::Map));
        }
    }

    /// Removes every listener the control and its ranging lines hold
    pub fn detach(&mut self, engine: &mut dyn MapEngine) {
        for listener in self.listeners.drain(..) {
            engine.off(listener);
        }
        self.ranging.detach(engine);
    }

    pub fn is_attached(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Consumes an engine event addressed to one of the control's listeners
    ///
    /// Returns false when the listener is not the control's.
    pub fn handle_engine_event(
        &mut self,
        engine: &mut dyn MapEngine,
        listener: ListenerId,
        event: &crate::input::events::MapEvent,
    ) -> bool {
        if self.listeners.contains(&listener) {
            if let Some(input) = DrawInput::from_event(event) {
                if let Err(err) = self.handle_input(engine, input) {
                    log::warn!("draw mode `{}` failed: {}", self.mode.name(), err);
                }
            }
            return true;
        }
        match self.ranging.feature_for_listener(listener) {
            Some(feature_id) => {
                self.dismiss(engine, &feature_id);
                true
            }
            None => false,
        }
    }

    /// Feeds one input to the active mode
    pub fn handle_input(&mut self, engine: &mut dyn MapEngine, input: DrawInput) -> Result<()> {
        let result = {
            let mut ctx = mode_context!(self, &mut *engine);
            dispatch(self.mode.as_mut(), &mut ctx, &input)
        };
        self.settle(engine);
        result
    }

    pub fn register_mode(&mut self, name: impl Into<String>, factory: ModeFactory) {
        self.modes.insert(name.into(), factory);
    }

    pub fn mode_name(&self) -> &str {
        self.mode.name()
    }

    pub fn change_mode(
        &mut self,
        engine: &mut dyn MapEngine,
        name: &str,
        options: ModeOptions,
    ) -> Result<()> {
        let result = self.enter(
            engine,
            ModeChange {
                name: name.to_string(),
                options,
            },
        );
        self.settle(engine);
        result
    }

    pub fn draw_line(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(engine, modes::DRAW_LINE_STRING, options)
    }

    pub fn draw_polygon(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(engine, modes::DRAW_POLYGON, options)
    }

    pub fn draw_point(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(engine, modes::DRAW_POINT, options)
    }

    pub fn draw_circle(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(engine, modes::DRAW_CIRCLE, options)
    }

    pub fn draw_rect(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(engine, modes::DRAW_RECT, options)
    }

    pub fn draw_arrow(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(engine, modes::DRAW_ARROW, options)
    }

    /// Draws a line that measures itself
    pub fn ranging(&mut self, engine: &mut dyn MapEngine, options: DrawOptions) -> Result<()> {
        self.start(
            engine,
            modes::DRAW_LINE_STRING,
            DrawOptions {
                ranging: true,
                ..options
            },
        )
    }

    fn start(&mut self, engine: &mut dyn MapEngine, mode: &str, options: DrawOptions) -> Result<()> {
        let mode_options = ModeOptions {
            ranging: options.ranging,
            override_previous: options.override_previous,
            ..ModeOptions::default()
        };
        self.options = options;
        self.change_mode(engine, mode, mode_options)
    }

    /// Deletes the selected features, firing a delete event
    pub fn delete_selected(&mut self, engine: &mut dyn MapEngine) -> Vec<DrawFeature> {
        let selected = self.store.selected_ids().to_vec();
        self.delete(engine, &selected)
    }

    /// Deletes every feature, firing a delete event
    pub fn delete_all(&mut self, engine: &mut dyn MapEngine) -> Vec<DrawFeature> {
        let ids = self.store.ids();
        self.delete(engine, &ids)
    }

    fn delete(&mut self, engine: &mut dyn MapEngine, ids: &[String]) -> Vec<DrawFeature> {
        let removed = {
            let mut ctx = mode_context!(self, &mut *engine);
            ctx.delete_features(ids, false)
        };
        if !removed.is_empty() && self.mode.name() != SIMPLE_SELECT {
            self.request(SIMPLE_SELECT, ModeOptions::default());
        }
        self.settle(engine);
        removed
    }

    /// Removes a ranging line together with its overlays, without an event
    fn dismiss(&mut self, engine: &mut dyn MapEngine, feature_id: &str) {
        log::debug!("dismissing ranging line `{}`", feature_id);
        {
            let mut ctx = mode_context!(self, &mut *engine);
            ctx.delete_features(&[feature_id.to_string()], true);
        }
        if self.mode.name() == DIRECT_SELECT {
            self.request(SIMPLE_SELECT, ModeOptions::default());
        }
        self.settle(engine);
    }

    /// Copies the set style keys onto a feature's properties
    pub fn update_style(&mut self, engine: &mut dyn MapEngine, id: &str, style: &DrawStyle) -> bool {
        let Some(feature) = self.store.get_mut(id) else {
            return false;
        };
        feature.properties.extend(style.properties());
        self.settle(engine);
        true
    }

    pub fn set_feature_property(
        &mut self,
        engine: &mut dyn MapEngine,
        id: &str,
        key: &str,
        value: Value,
    ) -> bool {
        let Some(feature) = self.store.get_mut(id) else {
            return false;
        };
        feature.properties.insert(key.to_string(), value);
        self.settle(engine);
        true
    }

    /// Imports an exported feature, rebuilding its shape from the control
    /// points; returns its id
    pub fn add(&mut self, engine: &mut dyn MapEngine, feature: &Feature) -> Result<String> {
        let fallback = self.store.next_id();
        let mut feature = DrawFeature::from_feature(feature, fallback)?;
        feature.refresh(&self.config);
        let id = feature.id.clone();
        self.store.insert(feature);
        self.settle(engine);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&DrawFeature> {
        self.store.get(id)
    }

    pub fn all(&self) -> &[DrawFeature] {
        self.store.all()
    }

    pub fn selected_ids(&self) -> &[String] {
        self.store.selected_ids()
    }

    pub fn ranging_lines(&self) -> &RangingRegistry {
        &self.ranging
    }

    /// Receiving end of the draw event stream
    pub fn events(&self) -> Receiver<DrawEvent> {
        self.receiver.clone()
    }

    /// Every feature as a GeoJSON feature collection
    pub fn to_geojson(&self) -> Result<Value> {
        GeoJson::collection(self.store.all().iter().map(DrawFeature::to_feature).collect())
            .to_value()
    }

    fn request(&mut self, name: &str, options: ModeOptions) {
        self.change = Some(ModeChange {
            name: name.to_string(),
            options,
        });
    }

    /// Stops the active mode and sets up the requested one
    ///
    /// Changes requested while the old mode stops are dropped. A mode that
    /// fails to set up leaves the control in simple_select.
    fn enter(&mut self, engine: &mut dyn MapEngine, change: ModeChange) -> Result<()> {
        let factory = self
            .modes
            .get(&change.name)
            .cloned()
            .ok_or_else(|| MapError::ModeNotFound(change.name.clone()))?;
        log::debug!("draw mode {} -> {}", self.mode.name(), change.name);

        {
            let mut ctx = mode_context!(self, &mut *engine);
            if let Err(err) = self.mode.on_stop(&mut ctx) {
                log::warn!("stopping `{}` failed: {}", self.mode.name(), err);
            }
        }
        self.change = None;

        self.mode = factory(&change.options);
        let setup = {
            let mut ctx = mode_context!(self, &mut *engine);
            self.mode.on_setup(&mut ctx)
        };
        if let Err(err) = setup {
            log::warn!("cannot enter `{}`: {}", change.name, err);
            self.change = None;
            self.mode = Box::new(SimpleSelectMode::new(&ModeOptions::default()));
            let mut ctx = mode_context!(self, &mut *engine);
            self.mode.on_setup(&mut ctx)?;
            return Err(err);
        }
        Ok(())
    }

    /// Applies pending mode changes and events, then renders
    fn settle(&mut self, engine: &mut dyn MapEngine) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            if let Some(change) = self.change.take() {
                if let Err(err) = self.enter(engine, change) {
                    log::warn!("draw mode change failed: {}", err);
                }
            }
            if self.pending.is_empty() && self.change.is_none() {
                break;
            }
            for mut event in std::mem::take(&mut self.pending) {
                self.apply_hooks(&mut event);
                let _ = self.sender.send(event);
            }
        }
        self.render(engine);
    }

    fn apply_hooks(&mut self, event: &mut DrawEvent) {
        match event.kind {
            DrawEventKind::Create => {
                let mut tags = self.options.style.properties();
                tags.insert("custom".to_string(), json!(true));
                for feature in &mut event.features {
                    feature.properties.extend(tags.clone());
                    if let Some(stored) = self.store.get_mut(&feature.id) {
                        stored.properties = feature.properties.clone();
                    }
                }
                if self.options.ranging {
                    self.request(SIMPLE_SELECT, ModeOptions::default());
                }
            }
            DrawEventKind::SelectionChange
                if self.options.ranging && !event.features.is_empty() =>
            {
                self.request(SIMPLE_SELECT, ModeOptions::default());
            }
            _ => {}
        }
    }

    /// Pushes the displayed features to the draw source
    ///
    /// The source and its layers are created with the first feature; nothing
    /// happens until the style has loaded or when the output is unchanged.
    fn render(&mut self, engine: &mut dyn MapEngine) {
        if !engine.is_style_loaded() {
            return;
        }
        let mut displayed = Vec::new();
        for feature in self.store.all() {
            let selected = self.store.is_selected(&feature.id);
            self.mode.display(feature, selected, &mut displayed);
        }
        let data = match GeoJson::collection(displayed).to_value() {
            Ok(data) => data,
            Err(err) => {
                log::warn!("cannot serialize draw features: {}", err);
                return;
            }
        };
        if self.rendered.as_ref() == Some(&data) {
            return;
        }

        let source_id = self.config.source_id.clone();
        let result = if engine.has_source(&source_id) {
            engine.update_source(&source_id, SourceUpdate::SetData(data.clone()))
        } else if self.store.is_empty() {
            return;
        } else {
            self.create_source(engine, &source_id, data.clone())
        };
        match result {
            Ok(()) => self.rendered = Some(data),
            Err(err) => log::warn!("cannot render draw features: {}", err),
        }
    }

    fn create_source(&self, engine: &mut dyn MapEngine, source_id: &str, data: Value) -> Result<()> {
        engine.add_source(source_id, json!({"type": "geojson", "data": data}))?;
        for layer in draw_layers(source_id) {
            engine.add_layer(layer, None)?;
        }
        log::debug!("created draw source `{}`", source_id);
        Ok(())
    }
}

impl Default for DrawControl {
    fn default() -> Self {
        Self::new(DrawConfig::default())
    }
}

impl fmt::Debug for DrawControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawControl")
            .field("mode", &self.mode.name())
            .field("features", &self.store.len())
            .field("selected", &self.store.selected_ids())
            .field("ranging_lines", &self.ranging.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}

fn user_paint(key: &str, fallback: Value) -> Value {
    json!(["coalesce", ["get", format!("user_{}", key)], fallback])
}

fn draw_layers(source_id: &str) -> [Value; 4] {
    [
        json!({
            "id": FILL_LAYER,
            "type": "fill",
            "source": source_id,
            "filter": ["==", ["geometry-type"], "Polygon"],
            "paint": {
                "fill-color": user_paint("fillColor", json!("#3bb2d0")),
                "fill-outline-color": user_paint("fillOutlineColor", json!("#3bb2d0")),
                "fill-opacity": user_paint("fillOpacity", json!(0.1)),
            },
        }),
        json!({
            "id": LINE_LAYER,
            "type": "line",
            "source": source_id,
            "filter": ["match", ["geometry-type"], ["LineString", "MultiLineString", "Polygon"], true, false],
            "layout": {"line-cap": "round", "line-join": "round"},
            "paint": {
                "line-color": user_paint("lineColor", json!("#3bb2d0")),
                "line-width": user_paint("lineWidth", json!(2)),
                "line-opacity": user_paint("lineOpacity", json!(1)),
            },
        }),
        json!({
            "id": POINT_LAYER,
            "type": "circle",
            "source": source_id,
            "filter": ["all", ["==", ["geometry-type"], "Point"], ["==", ["get", "meta"], "feature"]],
            "paint": {
                "circle-color": user_paint("circleColor", json!("#3bb2d0")),
                "circle-radius": user_paint("circleRadius", json!(5)),
                "circle-opacity": user_paint("circleOpacity", json!(1)),
            },
        }),
        json!({
            "id": VERTEX_LAYER,
            "type": "circle",
            "source": source_id,
            "filter": ["==", ["get", "meta"], "vertex"],
            "paint": {"circle-color": "#fbb03b", "circle-radius": 4},
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::geo::LngLat, testing::RecordingEngine, traits::Interaction};

    fn drain(control: &DrawControl) -> Vec<DrawEvent> {
        control.events().try_iter().collect()
    }

    fn kinds(events: &[DrawEvent]) -> Vec<DrawEventKind> {
        events.iter().map(|event| event.kind).collect()
    }

    fn drag_circle(control: &mut DrawControl, engine: &mut RecordingEngine, to: LngLat) {
        let center = LngLat::new(0.0, 0.0);
        control.handle_input(engine, DrawInput::MouseDown(center)).unwrap();
        control.handle_input(engine, DrawInput::Drag(to)).unwrap();
        control.handle_input(engine, DrawInput::MouseUp(to)).unwrap();
    }

    #[test]
    fn test_circle_draw_creates_and_selects() {
        let mut engine = RecordingEngine::new();
        let probe = engine.probe();
        let mut control = DrawControl::default();
        control.attach(&mut engine);
        control
            .draw_circle(&mut engine, DrawOptions::default())
            .unwrap();
        assert_eq!(control.mode_name(), modes::DRAW_CIRCLE);
        assert_eq!(probe.interaction(Interaction::DragPan), Some(false));

        drag_circle(&mut control, &mut engine, LngLat::new(0.01, 0.0));
        assert_eq!(control.mode_name(), SIMPLE_SELECT);
        assert_eq!(probe.interaction(Interaction::DragPan), Some(true));

        let events = drain(&control);
        assert_eq!(
            kinds(&events),
            vec![DrawEventKind::Create, DrawEventKind::SelectionChange]
        );
        let created = &events[0].features[0];
        assert_eq!(created.properties["custom"], json!(true));
        assert_eq!(control.selected_ids(), [created.id.clone()]);
        assert!(probe.source("maplet-draw").is_some());
        assert!(probe.layer_ids().contains(&VERTEX_LAYER.to_string()));
    }

    #[test]
    fn test_circle_without_drag_is_discarded() {
        let mut engine = RecordingEngine::new();
        let mut control = DrawControl::default();
        control
            .draw_circle(&mut engine, DrawOptions::default())
            .unwrap();
        let at = LngLat::new(1.0, 1.0);
        control.handle_input(&mut engine, DrawInput::MouseDown(at)).unwrap();
        control.handle_input(&mut engine, DrawInput::MouseUp(at)).unwrap();

        assert!(control.all().is_empty());
        assert_eq!(control.mode_name(), SIMPLE_SELECT);
        assert!(!kinds(&drain(&control)).contains(&DrawEventKind::Create));
    }

    #[test]
    fn test_circle_override_deletes_previous() {
        let mut engine = RecordingEngine::new();
        let mut control = DrawControl::default();
        let options = DrawOptions {
            override_previous: true,
            ..DrawOptions::default()
        };
        control.draw_circle(&mut engine, options.clone()).unwrap();
        drag_circle(&mut control, &mut engine, LngLat::new(0.01, 0.0));
        let first = control.all()[0].id.clone();
        drain(&control);

        control.draw_circle(&mut engine, options).unwrap();
        let events = drain(&control);
        assert!(events
            .iter()
            .any(|event| event.kind == DrawEventKind::Delete && event.features[0].id == first));
        assert!(control.get(&first).is_none());
    }

    #[test]
    fn test_unknown_mode_keeps_current() {
        let mut engine = RecordingEngine::new();
        let mut control = DrawControl::default();
        let err = control
            .change_mode(&mut engine, "draw_spiral", ModeOptions::default())
            .unwrap_err();
        assert!(matches!(err, MapError::ModeNotFound(name) if name == "draw_spiral"));
        assert_eq!(control.mode_name(), SIMPLE_SELECT);
    }

    #[test]
    fn test_direct_select_needs_feature() {
        let mut engine = RecordingEngine::new();
        let mut control = DrawControl::default();
        let result = control.change_mode(&mut engine, DIRECT_SELECT, ModeOptions::feature("ghost"));
        assert!(matches!(result, Err(MapError::Draw(_))));
        assert_eq!(control.mode_name(), SIMPLE_SELECT);
    }

    #[test]
    fn test_style_copied_on_create() {
        let mut engine = RecordingEngine::new();
        let mut control = DrawControl::default();
        let options = DrawOptions {
            style: DrawStyle {
                line_color: Some("#ff0000".into()),
                ..DrawStyle::default()
            },
            ..DrawOptions::default()
        };
        control.draw_point(&mut engine, options).unwrap();
        control
            .handle_input(&mut engine, DrawInput::Click(LngLat::new(3.0, 4.0)))
            .unwrap();

        let point = control.all()[0].clone();
        assert_eq!(point.properties["lineColor"], json!("#ff0000"));
        assert!(!point.properties.contains_key("fillColor"));

        assert!(control.update_style(
            &mut engine,
            &point.id,
            &DrawStyle {
                fill_opacity: Some(0.5),
                ..DrawStyle::default()
            }
        ));
        assert_eq!(control.all()[0].properties["fillOpacity"], json!(0.5));
    }

    #[test]
    fn test_delete_all_fires_delete() {
        let mut engine = RecordingEngine::new();
        let mut control = DrawControl::default();
        for lng in [1.0, 2.0] {
            control
                .draw_point(&mut engine, DrawOptions::default())
                .unwrap();
            control
                .handle_input(&mut engine, DrawInput::Click(LngLat::new(lng, 0.0)))
                .unwrap();
        }
        drain(&control);
        let removed = control.delete_all(&mut engine);
        assert_eq!(removed.len(), 2);
        let events = drain(&control);
        assert_eq!(events[0].kind, DrawEventKind::Delete);
        assert_eq!(events[0].features.len(), 2);
        assert!(control.to_geojson().unwrap()["features"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_detach_unbinds_listeners() {
        let mut engine = RecordingEngine::new();
        let probe = engine.probe();
        let mut control = DrawControl::default();
        control.attach(&mut engine);
        assert_eq!(probe.listener_count(), INPUT_EVENTS.len());
        control.detach(&mut engine);
        assert_eq!(probe.listener_count(), 0);
    }
}
