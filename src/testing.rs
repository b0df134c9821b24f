//! In-memory engine for tests and headless hosts
//!
//! `RecordingEngine` keeps a source/layer/terrain registry that rejects the
//! same ordering mistakes a real engine rejects, and records every mutation
//! it receives. An `EngineProbe` shares its state so assertions and event
//! injection work after the engine itself has been boxed into a
//! [`MapInstance`](crate::MapInstance).

use crate::{
    core::geo::Point,
    input::events::MapEvent,
    traits::{
        CameraOption, Container, ContainerElement, EngineEvent, EventTarget, ImageData,
        ImageLoader, Interaction, ListenerId, MapEngine, MapSetting, Overlay, OverlayId,
        OverlayUpdate, SourceUpdate, StyleLayer, StyleOptions,
    },
    MapError, Result,
};
use async_trait::async_trait;
use fxhash::FxHashMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// One mutation the engine received
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    AddSource(String, Value),
    UpdateSource(String, SourceUpdate),
    RemoveSource(String),
    AddLayer(Value, Option<String>),
    RemoveLayer(String),
    MoveLayer(String, Option<String>),
    SetLayoutProperty(String, String, Option<Value>),
    SetPaintProperty(String, String, Option<Value>),
    SetFilter(String, Option<Value>),
    SetLayerZoomRange(String, Option<f64>, Option<f64>),
    SetStyle(Value, StyleOptions),
    SetTerrain(Option<Value>),
    SetFog(Option<Value>),
    SetLight(Value),
    SetCameraOption(CameraOption),
    SetMapSetting(MapSetting),
    SetCursor(String),
    SetInteraction(Interaction, bool),
    On(String, EventTarget),
    Off(ListenerId),
    AddImage(String),
    UpdateImage(String),
    RemoveImage(String),
    AddOverlay(OverlayId),
    UpdateOverlay(OverlayId, OverlayUpdate),
    RemoveOverlay(OverlayId),
    SetContainer(String),
    Resize,
    Remove,
}

impl EngineCall {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::AddSource(..) => "add_source",
            EngineCall::UpdateSource(..) => "update_source",
            EngineCall::RemoveSource(..) => "remove_source",
            EngineCall::AddLayer(..) => "add_layer",
            EngineCall::RemoveLayer(..) => "remove_layer",
            EngineCall::MoveLayer(..) => "move_layer",
            EngineCall::SetLayoutProperty(..) => "set_layout_property",
            EngineCall::SetPaintProperty(..) => "set_paint_property",
            EngineCall::SetFilter(..) => "set_filter",
            EngineCall::SetLayerZoomRange(..) => "set_layer_zoom_range",
            EngineCall::SetStyle(..) => "set_style",
            EngineCall::SetTerrain(..) => "set_terrain",
            EngineCall::SetFog(..) => "set_fog",
            EngineCall::SetLight(..) => "set_light",
            EngineCall::SetCameraOption(..) => "set_camera_option",
            EngineCall::SetMapSetting(..) => "set_map_setting",
            EngineCall::SetCursor(..) => "set_cursor",
            EngineCall::SetInteraction(..) => "set_interaction",
            EngineCall::On(..) => "on",
            EngineCall::Off(..) => "off",
            EngineCall::AddImage(..) => "add_image",
            EngineCall::UpdateImage(..) => "update_image",
            EngineCall::RemoveImage(..) => "remove_image",
            EngineCall::AddOverlay(..) => "add_overlay",
            EngineCall::UpdateOverlay(..) => "update_overlay",
            EngineCall::RemoveOverlay(..) => "remove_overlay",
            EngineCall::SetContainer(..) => "set_container",
            EngineCall::Resize => "resize",
            EngineCall::Remove => "remove",
        }
    }

    /// Whether the call changes registry or style state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            EngineCall::On(..) | EngineCall::Off(..) | EngineCall::Resize
        )
    }
}

#[derive(Debug)]
struct EngineState {
    style_loaded: bool,
    sources: Vec<(String, Value)>,
    layers: Vec<Value>,
    terrain: Option<Value>,
    images: BTreeMap<String, ImageData>,
    listeners: BTreeMap<ListenerId, (String, EventTarget)>,
    next_listener: u64,
    overlays: BTreeMap<OverlayId, Overlay>,
    next_overlay: u64,
    queue: Vec<EngineEvent>,
    calls: Vec<EngineCall>,
    cursor: Option<String>,
    interactions: FxHashMap<Interaction, bool>,
    rendered: FxHashMap<String, Vec<Value>>,
    container: Container,
    options: Value,
    removed: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            style_loaded: true,
            sources: Vec::new(),
            layers: Vec::new(),
            terrain: None,
            images: BTreeMap::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            overlays: BTreeMap::new(),
            next_overlay: 0,
            queue: Vec::new(),
            calls: Vec::new(),
            cursor: None,
            interactions: FxHashMap::default(),
            rendered: FxHashMap::default(),
            container: Arc::new(Mutex::new(ContainerElement::new("engine"))),
            options: Value::Null,
            removed: false,
        }
    }
}

impl EngineState {
    fn source_index(&self, id: &str) -> Option<usize> {
        self.sources.iter().position(|(source, _)| source == id)
    }

    fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.get("id").and_then(Value::as_str) == Some(id))
    }

    fn layer_mut(&mut self, op: &'static str, id: &str) -> Result<&mut Map<String, Value>> {
        let index = self
            .layer_index(id)
            .ok_or_else(|| MapError::engine(op, format!("layer `{}` does not exist", id)))?;
        self.layers[index]
            .as_object_mut()
            .ok_or_else(|| MapError::engine(op, "layer is not an object"))
    }

    fn insert_layer(&mut self, layer: Value, before_id: Option<&str>) {
        match before_id.and_then(|before| self.layer_index(before)) {
            Some(index) => self.layers.insert(index, layer),
            None => self.layers.push(layer),
        }
    }

    fn set_property(
        &mut self,
        op: &'static str,
        group: &str,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<()> {
        let spec = self.layer_mut(op, layer)?;
        let entry = spec
            .entry(group.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(properties) = entry {
            match value {
                Some(value) => {
                    properties.insert(name.to_string(), value.clone());
                }
                None => {
                    properties.remove(name);
                }
            }
        }
        Ok(())
    }

    fn queue_for(&mut self, event: &MapEvent, target: &EventTarget) {
        let name = event.kind.name().to_string();
        let matching: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, (event_name, listener_target))| {
                *event_name == name && listener_target == target
            })
            .map(|(listener, _)| *listener)
            .collect();
        for listener in matching {
            self.queue.push(EngineEvent {
                listener,
                event: event.clone(),
            });
        }
    }
}

fn lock(state: &Arc<Mutex<EngineState>>) -> MutexGuard<'_, EngineState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Registry-only engine that records what it is asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    state: Arc<Mutex<EngineState>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style_loaded(self, loaded: bool) -> Self {
        lock(&self.state).style_loaded = loaded;
        self
    }

    pub fn probe(&self) -> EngineProbe {
        EngineProbe {
            state: self.state.clone(),
        }
    }

    /// Factory that hands out handles to this engine's state
    pub fn into_factory(self) -> impl Fn(Value, Container) -> Result<Box<dyn MapEngine>> {
        move |options, container| {
            {
                let mut state = lock(&self.state);
                state.options = options;
                state.container = container;
                state.removed = false;
            }
            Ok(Box::new(self.clone()) as Box<dyn MapEngine>)
        }
    }

    fn record(&self, call: EngineCall) -> MutexGuard<'_, EngineState> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }
}

impl MapEngine for RecordingEngine {
    fn is_style_loaded(&self) -> bool {
        lock(&self.state).style_loaded
    }

    fn is_source_loaded(&self, id: &str) -> bool {
        self.has_source(id)
    }

    fn has_source(&self, id: &str) -> bool {
        lock(&self.state).source_index(id).is_some()
    }

    fn has_layer(&self, id: &str) -> bool {
        lock(&self.state).layer_index(id).is_some()
    }

    fn style_layers(&self) -> Vec<StyleLayer> {
        lock(&self.state)
            .layers
            .iter()
            .map(|layer| StyleLayer {
                id: layer
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source: layer
                    .get("source")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect()
    }

    fn terrain(&self) -> Option<Value> {
        lock(&self.state).terrain.clone()
    }

    fn add_source(&mut self, id: &str, spec: Value) -> Result<()> {
        let mut state = self.record(EngineCall::AddSource(id.to_string(), spec.clone()));
        if state.source_index(id).is_some() {
            return Err(MapError::engine(
                "add_source",
                format!("source `{}` already exists", id),
            ));
        }
        state.sources.push((id.to_string(), spec));
        Ok(())
    }

    fn update_source(&mut self, id: &str, update: SourceUpdate) -> Result<()> {
        let mut state = self.record(EngineCall::UpdateSource(id.to_string(), update.clone()));
        let index = state.source_index(id).ok_or_else(|| {
            MapError::engine("update_source", format!("source `{}` does not exist", id))
        })?;
        if let Value::Object(spec) = &mut state.sources[index].1 {
            match update {
                SourceUpdate::SetData(data) => {
                    spec.insert("data".into(), data);
                }
                SourceUpdate::UpdateImage { url, coordinates } => {
                    spec.insert("url".into(), url);
                    spec.insert("coordinates".into(), coordinates);
                }
                SourceUpdate::SetCoordinates(coordinates) => {
                    spec.insert("coordinates".into(), coordinates);
                }
                SourceUpdate::SetUrl(url) => {
                    spec.insert("url".into(), url);
                }
                SourceUpdate::SetTiles(tiles) => {
                    spec.insert("tiles".into(), tiles);
                }
            }
        }
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<()> {
        let mut state = self.record(EngineCall::RemoveSource(id.to_string()));
        let index = state.source_index(id).ok_or_else(|| {
            MapError::engine("remove_source", format!("source `{}` does not exist", id))
        })?;
        if let Some(layer) = state
            .layers
            .iter()
            .find(|layer| layer.get("source").and_then(Value::as_str) == Some(id))
        {
            return Err(MapError::OrderingViolation(format!(
                "source `{}` is still used by layer `{}`",
                id,
                layer.get("id").and_then(Value::as_str).unwrap_or_default()
            )));
        }
        let terrain_source = state
            .terrain
            .as_ref()
            .and_then(|terrain| terrain.get("source"))
            .and_then(Value::as_str);
        if terrain_source == Some(id) {
            return Err(MapError::OrderingViolation(format!(
                "source `{}` is still used by terrain",
                id
            )));
        }
        state.sources.remove(index);
        Ok(())
    }

    fn add_layer(&mut self, spec: Value, before_id: Option<&str>) -> Result<()> {
        let mut state = self.record(EngineCall::AddLayer(
            spec.clone(),
            before_id.map(str::to_string),
        ));
        let id = spec
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| MapError::engine("add_layer", "layer has no id"))?;
        if state.layer_index(id).is_some() {
            return Err(MapError::engine(
                "add_layer",
                format!("layer `{}` already exists", id),
            ));
        }
        if let Some(source) = spec.get("source").and_then(Value::as_str) {
            if state.source_index(source).is_none() {
                return Err(MapError::engine(
                    "add_layer",
                    format!("source `{}` does not exist", source),
                ));
            }
        }
        state.insert_layer(spec, before_id);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<()> {
        let mut state = self.record(EngineCall::RemoveLayer(id.to_string()));
        let index = state.layer_index(id).ok_or_else(|| {
            MapError::engine("remove_layer", format!("layer `{}` does not exist", id))
        })?;
        state.layers.remove(index);
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before_id: Option<&str>) -> Result<()> {
        let mut state = self.record(EngineCall::MoveLayer(
            id.to_string(),
            before_id.map(str::to_string),
        ));
        let index = state.layer_index(id).ok_or_else(|| {
            MapError::engine("move_layer", format!("layer `{}` does not exist", id))
        })?;
        let layer = state.layers.remove(index);
        state.insert_layer(layer, before_id);
        Ok(())
    }

    fn set_layout_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<()> {
        let mut state = self.record(EngineCall::SetLayoutProperty(
            layer.to_string(),
            name.to_string(),
            value.cloned(),
        ));
        state.set_property("set_layout_property", "layout", layer, name, value)
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<()> {
        let mut state = self.record(EngineCall::SetPaintProperty(
            layer.to_string(),
            name.to_string(),
            value.cloned(),
        ));
        state.set_property("set_paint_property", "paint", layer, name, value)
    }

    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<()> {
        let mut state = self.record(EngineCall::SetFilter(layer.to_string(), filter.cloned()));
        let spec = state.layer_mut("set_filter", layer)?;
        match filter {
            Some(filter) => {
                spec.insert("filter".into(), filter.clone());
            }
            None => {
                spec.remove("filter");
            }
        }
        Ok(())
    }

    fn set_layer_zoom_range(
        &mut self,
        layer: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<()> {
        let mut state = self.record(EngineCall::SetLayerZoomRange(layer.to_string(), min, max));
        let spec = state.layer_mut("set_layer_zoom_range", layer)?;
        spec.insert("minzoom".into(), json!(min));
        spec.insert("maxzoom".into(), json!(max));
        Ok(())
    }

    fn set_style(&mut self, style: &Value, options: &StyleOptions) -> Result<()> {
        self.record(EngineCall::SetStyle(style.clone(), options.clone()));
        Ok(())
    }

    fn set_terrain(&mut self, terrain: Option<&Value>) -> Result<()> {
        let mut state = self.record(EngineCall::SetTerrain(terrain.cloned()));
        if let Some(source) = terrain
            .and_then(|terrain| terrain.get("source"))
            .and_then(Value::as_str)
        {
            if state.source_index(source).is_none() {
                return Err(MapError::engine(
                    "set_terrain",
                    format!("source `{}` does not exist", source),
                ));
            }
        }
        state.terrain = terrain.cloned();
        Ok(())
    }

    fn set_fog(&mut self, fog: Option<&Value>) -> Result<()> {
        self.record(EngineCall::SetFog(fog.cloned()));
        Ok(())
    }

    fn set_light(&mut self, light: &Value) -> Result<()> {
        self.record(EngineCall::SetLight(light.clone()));
        Ok(())
    }

    fn set_camera_option(&mut self, option: CameraOption) -> Result<()> {
        self.record(EngineCall::SetCameraOption(option));
        Ok(())
    }

    fn set_map_setting(&mut self, setting: MapSetting) -> Result<()> {
        self.record(EngineCall::SetMapSetting(setting));
        Ok(())
    }

    fn set_cursor(&mut self, cursor: &str) {
        let mut state = self.record(EngineCall::SetCursor(cursor.to_string()));
        state.cursor = Some(cursor.to_string());
    }

    fn set_interaction(&mut self, interaction: Interaction, enabled: bool) {
        let mut state = self.record(EngineCall::SetInteraction(interaction, enabled));
        state.interactions.insert(interaction, enabled);
    }

    fn on(&mut self, event: &str, target: &EventTarget) -> ListenerId {
        let mut state = self.record(EngineCall::On(event.to_string(), target.clone()));
        state.next_listener += 1;
        let listener = ListenerId(state.next_listener);
        state
            .listeners
            .insert(listener, (event.to_string(), target.clone()));
        listener
    }

    fn off(&mut self, listener: ListenerId) {
        let mut state = self.record(EngineCall::Off(listener));
        state.listeners.remove(&listener);
        state.queue.retain(|queued| queued.listener != listener);
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut lock(&self.state).queue)
    }

    fn query_rendered_features(&self, _point: Point, layers: &[&str]) -> Vec<Value> {
        let state = lock(&self.state);
        layers
            .iter()
            .filter_map(|layer| state.rendered.get(*layer))
            .flatten()
            .cloned()
            .collect()
    }

    fn has_image(&self, name: &str) -> bool {
        lock(&self.state).images.contains_key(name)
    }

    fn add_image(&mut self, name: &str, image: ImageData) -> Result<()> {
        let mut state = self.record(EngineCall::AddImage(name.to_string()));
        state.images.insert(name.to_string(), image);
        Ok(())
    }

    fn update_image(&mut self, name: &str, image: ImageData) -> Result<()> {
        let mut state = self.record(EngineCall::UpdateImage(name.to_string()));
        match state.images.get_mut(name) {
            Some(existing) => {
                *existing = image;
                Ok(())
            }
            None => Err(MapError::ImageNotFound(name.to_string())),
        }
    }

    fn remove_image(&mut self, name: &str) {
        let mut state = self.record(EngineCall::RemoveImage(name.to_string()));
        state.images.remove(name);
    }

    fn list_images(&self) -> Vec<String> {
        lock(&self.state).images.keys().cloned().collect()
    }

    fn add_overlay(&mut self, overlay: Overlay) -> OverlayId {
        let mut state = lock(&self.state);
        state.next_overlay += 1;
        let id = OverlayId(state.next_overlay);
        state.calls.push(EngineCall::AddOverlay(id));
        state.overlays.insert(id, overlay);
        id
    }

    fn update_overlay(&mut self, id: OverlayId, update: OverlayUpdate) {
        let mut state = self.record(EngineCall::UpdateOverlay(id, update.clone()));
        if let Some(overlay) = state.overlays.get_mut(&id) {
            if let OverlayUpdate::LngLat(lng_lat) = update {
                overlay.lng_lat = lng_lat;
            }
        }
    }

    fn remove_overlay(&mut self, id: OverlayId) {
        let mut state = self.record(EngineCall::RemoveOverlay(id));
        state.overlays.remove(&id);
    }

    fn container(&self) -> Container {
        lock(&self.state).container.clone()
    }

    fn set_container(&mut self, container: Container) {
        let id = match container.lock() {
            Ok(element) => element.id.clone(),
            Err(poisoned) => poisoned.into_inner().id.clone(),
        };
        let mut state = self.record(EngineCall::SetContainer(id));
        state.container = container;
    }

    fn resize(&mut self) {
        self.record(EngineCall::Resize);
    }

    fn remove(&mut self) {
        let mut state = self.record(EngineCall::Remove);
        state.removed = true;
        state.listeners.clear();
        state.queue.clear();
    }
}

/// Shared view into a [`RecordingEngine`]
#[derive(Debug, Clone)]
pub struct EngineProbe {
    state: Arc<Mutex<EngineState>>,
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.state).calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<EngineCall> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.name() == name)
            .cloned()
            .collect()
    }

    /// Mutations recorded so far, excluding listener bookkeeping
    pub fn mutations(&self) -> Vec<EngineCall> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn set_style_loaded(&self, loaded: bool) {
        lock(&self.state).style_loaded = loaded;
    }

    pub fn cursor(&self) -> Option<String> {
        lock(&self.state).cursor.clone()
    }

    pub fn interaction(&self, interaction: Interaction) -> Option<bool> {
        lock(&self.state).interactions.get(&interaction).copied()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Listeners scoped to a layer
    pub fn layer_listener_count(&self, layer_id: &str) -> usize {
        let target = EventTarget::Layer(layer_id.to_string());
        lock(&self.state)
            .listeners
            .values()
            .filter(|(_, listener_target)| *listener_target == target)
            .count()
    }

    pub fn source_ids(&self) -> Vec<String> {
        lock(&self.state)
            .sources
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn source(&self, id: &str) -> Option<Value> {
        let state = lock(&self.state);
        state
            .source_index(id)
            .map(|index| state.sources[index].1.clone())
    }

    /// Layer ids in stacking order, bottom first
    pub fn layer_ids(&self) -> Vec<String> {
        lock(&self.state)
            .layers
            .iter()
            .filter_map(|layer| layer.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn layer(&self, id: &str) -> Option<Value> {
        let state = lock(&self.state);
        state.layer_index(id).map(|index| state.layers[index].clone())
    }

    pub fn terrain(&self) -> Option<Value> {
        lock(&self.state).terrain.clone()
    }

    pub fn overlays(&self) -> Vec<(OverlayId, Overlay)> {
        lock(&self.state)
            .overlays
            .iter()
            .map(|(id, overlay)| (*id, overlay.clone()))
            .collect()
    }

    pub fn overlay_count(&self) -> usize {
        lock(&self.state).overlays.len()
    }

    pub fn images(&self) -> Vec<String> {
        lock(&self.state).images.keys().cloned().collect()
    }

    pub fn options(&self) -> Value {
        lock(&self.state).options.clone()
    }

    pub fn container(&self) -> Container {
        lock(&self.state).container.clone()
    }

    pub fn is_removed(&self) -> bool {
        lock(&self.state).removed
    }

    /// Features returned when a query hits `layer_id`
    pub fn set_rendered_features(&self, layer_id: &str, features: Vec<Value>) {
        lock(&self.state)
            .rendered
            .insert(layer_id.to_string(), features);
    }

    /// Queues `event` for every map-level listener of its kind
    pub fn emit_map(&self, event: MapEvent) {
        lock(&self.state).queue_for(&event, &EventTarget::Map);
    }

    /// Queues `event` for every listener scoped to `layer_id`
    pub fn emit_layer(&self, layer_id: &str, event: MapEvent) {
        lock(&self.state).queue_for(&event, &EventTarget::Layer(layer_id.to_string()));
    }

    /// Queues `event` for every listener on an overlay
    pub fn emit_overlay(&self, overlay: OverlayId, event: MapEvent) {
        lock(&self.state).queue_for(&event, &EventTarget::Overlay(overlay));
    }
}

/// Image loader serving a fixed url table
#[derive(Debug, Clone, Default)]
pub struct StaticImageLoader {
    images: FxHashMap<String, ImageData>,
}

impl StaticImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: impl Into<String>, image: ImageData) -> Self {
        self.images.insert(url.into(), image);
        self
    }
}

#[async_trait]
impl ImageLoader for StaticImageLoader {
    async fn load_image(&self, url: &str) -> Result<ImageData> {
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| MapError::ImageLoad {
                name: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_removal_rejected_while_referenced() {
        let mut engine = RecordingEngine::new();
        engine.add_source("s", json!({"type": "geojson"})).unwrap();
        engine
            .add_layer(json!({"id": "l", "type": "line", "source": "s"}), None)
            .unwrap();
        assert!(matches!(
            engine.remove_source("s"),
            Err(MapError::OrderingViolation(_))
        ));
        engine.remove_layer("l").unwrap();
        engine.remove_source("s").unwrap();
        assert!(!engine.has_source("s"));
    }

    #[test]
    fn test_layer_needs_source() {
        let mut engine = RecordingEngine::new();
        let result = engine.add_layer(json!({"id": "l", "source": "missing"}), None);
        assert!(matches!(result, Err(MapError::Engine { op: "add_layer", .. })));
    }

    #[test]
    fn test_before_id_ordering() {
        let mut engine = RecordingEngine::new();
        let probe = engine.probe();
        engine.add_layer(json!({"id": "a"}), None).unwrap();
        engine.add_layer(json!({"id": "b"}), None).unwrap();
        engine.add_layer(json!({"id": "c"}), Some("a")).unwrap();
        assert_eq!(probe.layer_ids(), vec!["c", "a", "b"]);
        engine.move_layer("c", None).unwrap();
        assert_eq!(probe.layer_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_events_reach_matching_listeners() {
        let mut engine = RecordingEngine::new();
        let probe = engine.probe();
        let map_click = engine.on("click", &EventTarget::Map);
        let layer_click = engine.on("click", &EventTarget::Layer("l".into()));
        probe.emit_map(MapEvent::new(crate::MapEventKind::Gesture(
            crate::GestureKind::Click,
        )));
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].listener, map_click);
        assert_ne!(events[0].listener, layer_click);
        assert!(engine.drain_events().is_empty());
    }
}
