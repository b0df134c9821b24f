use crate::{
    core::{
        context::BindingContext,
        diff::{compact, diff_keys, equals, equals_opt},
        map::MapInstance,
        scheduler::CancelToken,
    },
    input::{
        events::GestureKind,
        handler::{replace_shared, HandlerTable, Route, SharedHandlers},
    },
    layers::{Binder, Reconciled},
    traits::{EventTarget, ListenerId},
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::task::Poll;

/// Rendering rule kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Fill,
    Line,
    Symbol,
    Circle,
    Heatmap,
    FillExtrusion,
    Raster,
    Hillshade,
    Background,
    Sky,
}

impl LayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Fill => "fill",
            LayerType::Line => "line",
            LayerType::Symbol => "symbol",
            LayerType::Circle => "circle",
            LayerType::Heatmap => "heatmap",
            LayerType::FillExtrusion => "fill-extrusion",
            LayerType::Raster => "raster",
            LayerType::Hillshade => "hillshade",
            LayerType::Background => "background",
            LayerType::Sky => "sky",
        }
    }
}

/// Declared layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerProps {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    /// Owning source; falls back to the enclosing source binder's id
    pub source: Option<String>,
    #[serde(rename = "source-layer")]
    pub source_layer: Option<String>,
    /// Insert/move hint; passed positionally, never stored in the layer spec
    pub before_id: Option<String>,
    #[serde(default)]
    pub layout: Map<String, Value>,
    #[serde(default)]
    pub paint: Map<String, Value>,
    pub filter: Option<Value>,
    pub minzoom: Option<f64>,
    pub maxzoom: Option<f64>,
    /// Remaining style-spec keys (metadata, ...)
    #[serde(flatten)]
    pub options: Map<String, Value>,
    /// Layer-scoped gesture handlers, keyed by `MapEventKind::Gesture`
    #[serde(skip)]
    pub handlers: HandlerTable,
}

impl LayerProps {
    pub fn new(layer_type: LayerType) -> Self {
        Self {
            id: None,
            layer_type,
            source: None,
            source_layer: None,
            before_id: None,
            layout: Map::new(),
            paint: Map::new(),
            filter: None,
            minzoom: None,
            maxzoom: None,
            options: Map::new(),
            handlers: HandlerTable::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_before(mut self, before_id: impl Into<String>) -> Self {
        self.before_id = Some(before_id.into());
        self
    }

    pub fn with_layout(mut self, key: impl Into<String>, value: Value) -> Self {
        self.layout.insert(key.into(), value);
        self
    }

    pub fn with_paint(mut self, key: impl Into<String>, value: Value) -> Self {
        self.paint.insert(key.into(), value);
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_zoom_range(mut self, minzoom: Option<f64>, maxzoom: Option<f64>) -> Self {
        self.minzoom = minzoom;
        self.maxzoom = maxzoom;
        self
    }

    pub fn on<F>(mut self, gesture: GestureKind, callback: F) -> Self
    where
        F: Fn(&crate::MapEvent) + Send + Sync + 'static,
    {
        self.handlers
            .on(crate::MapEventKind::Gesture(gesture), callback);
        self
    }

    /// Compares everything the engine sees; handlers are ignored
    pub fn same_spec(&self, other: &LayerProps) -> bool {
        self.layer_type == other.layer_type
            && self.source == other.source
            && self.source_layer == other.source_layer
            && self.before_id == other.before_id
            && self.minzoom == other.minzoom
            && self.maxzoom == other.maxzoom
            && equals_opt(self.filter.as_ref(), other.filter.as_ref())
            && equals(&Value::Object(self.layout.clone()), &Value::Object(other.layout.clone()))
            && equals(&Value::Object(self.paint.clone()), &Value::Object(other.paint.clone()))
            && equals(
                &Value::Object(self.options.clone()),
                &Value::Object(other.options.clone()),
            )
    }

    /// Style-spec object passed to `addLayer`, minus the `beforeId` hint
    fn engine_spec(&self, id: &str, source: Option<&str>) -> Value {
        let mut spec = compact(&self.options);
        spec.insert("id".into(), Value::String(id.to_string()));
        spec.insert("type".into(), Value::String(self.layer_type.as_str().into()));
        if let Some(source) = source {
            spec.insert("source".into(), Value::String(source.to_string()));
        }
        if let Some(source_layer) = &self.source_layer {
            spec.insert("source-layer".into(), Value::String(source_layer.clone()));
        }
        let layout = compact(&self.layout);
        if !layout.is_empty() {
            spec.insert("layout".into(), Value::Object(layout));
        }
        let paint = compact(&self.paint);
        if !paint.is_empty() {
            spec.insert("paint".into(), Value::Object(paint));
        }
        if let Some(filter) = self.filter.as_ref().filter(|filter| !filter.is_null()) {
            spec.insert("filter".into(), filter.clone());
        }
        if let Some(minzoom) = self.minzoom {
            spec.insert("minzoom".into(), minzoom.into());
        }
        if let Some(maxzoom) = self.maxzoom {
            spec.insert("maxzoom".into(), maxzoom.into());
        }
        Value::Object(spec)
    }
}

/// Keeps one declared layer inserted, ordered and styled
#[derive(Debug)]
pub struct LayerBinder {
    id: String,
    parent_source: Option<String>,
    applied: Option<LayerProps>,
    handlers: SharedHandlers,
    listeners: Vec<ListenerId>,
    /// Removal queued by `teardown` that has not run yet, with the props
    /// the layer was last styled with
    pending_removal: Option<(CancelToken, Option<LayerProps>)>,
}

impl LayerBinder {
    /// Binds `props`, generating `layer-<n>` when no id is declared
    ///
    /// `parent_source` is the id of the enclosing source binder, used when
    /// the props name no source of their own.
    pub fn new(
        props: &LayerProps,
        parent_source: Option<&str>,
        context: &mut BindingContext,
    ) -> Self {
        let id = props.id.clone().unwrap_or_else(|| context.next_layer_id());
        Self {
            id,
            parent_source: parent_source.map(str::to_string),
            applied: None,
            handlers: HandlerTable::new().into_shared(),
            listeners: Vec::new(),
            pending_removal: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of gesture listeners currently bound
    pub fn bound_gestures(&self) -> usize {
        self.listeners.len()
    }

    fn ready_key(&self) -> String {
        format!("layer:{}", self.id)
    }

    fn resolve_source(&self, props: &LayerProps) -> Option<String> {
        props.source.clone().or_else(|| self.parent_source.clone())
    }

    /// Inserts the layer or applies the changed parts of `props`
    ///
    /// Handlers are swapped in place on every pass, so they never require
    /// listeners to be rebound.
    pub fn reconcile(&mut self, map: &mut MapInstance, props: LayerProps) -> Result<Reconciled> {
        replace_shared(&self.handlers, props.handlers.clone());

        // Declared again before the queued removal ran: keep the layer
        if let Some((token, last)) = self.pending_removal.take() {
            log::debug!("layer `{}` redeclared before removal", self.id);
            token.cancel();
            if self.applied.is_none() {
                self.applied = last;
            }
        }

        if !map.engine().has_layer(&self.id) {
            return self.create(map, props);
        }

        let old = self.applied.take().unwrap_or_else(|| props.clone());
        if old.same_spec(&props) {
            self.applied = Some(props);
            self.bind_gestures(map);
            return Ok(Reconciled::Unchanged);
        }

        let result = self.update(map, &props, &old);
        self.applied = Some(if result.is_ok() { props } else { old });
        self.bind_gestures(map);
        result
    }

    fn create(&mut self, map: &mut MapInstance, props: LayerProps) -> Result<Reconciled> {
        let source = self.resolve_source(&props);
        let ready = map.engine().is_style_loaded()
            && source
                .as_deref()
                .map_or(true, |source| map.engine().has_source(source));
        if !ready {
            log::debug!("deferring layer `{}` until its source is registered", self.id);
            map.schedule_until(
                self.ready_key(),
                Box::new(move |engine| {
                    let ready = engine.is_style_loaded()
                        && source
                            .as_deref()
                            .map_or(true, |source| engine.has_source(source));
                    Ok(if ready { Poll::Ready(()) } else { Poll::Pending })
                }),
            );
            return Ok(Reconciled::Deferred);
        }

        log::debug!("adding layer `{}`", self.id);
        let spec = props.engine_spec(&self.id, source.as_deref());
        map.engine_mut()
            .add_layer(spec, props.before_id.as_deref())?;
        self.applied = Some(props);
        self.bind_gestures(map);
        Ok(Reconciled::Created)
    }

    /// Position, layout, paint, filter, zoom range; in that order
    fn update(
        &self,
        map: &mut MapInstance,
        props: &LayerProps,
        old: &LayerProps,
    ) -> Result<Reconciled> {
        let id = self.id.as_str();
        let engine = map.engine_mut();
        let mut touched = false;

        if props.before_id != old.before_id {
            log::trace!("layer `{}`: moving before {:?}", id, props.before_id);
            engine.move_layer(id, props.before_id.as_deref())?;
            touched = true;
        }

        let layout = diff_keys(&props.layout, &old.layout);
        for key in &layout.changed {
            log::trace!("layer `{}`: layout {}", id, key);
            engine.set_layout_property(id, key, props.layout.get(key))?;
        }
        for key in &layout.removed {
            engine.set_layout_property(id, key, None)?;
        }
        touched |= !layout.is_empty();

        let paint = diff_keys(&props.paint, &old.paint);
        for key in &paint.changed {
            log::trace!("layer `{}`: paint {}", id, key);
            engine.set_paint_property(id, key, props.paint.get(key))?;
        }
        for key in &paint.removed {
            engine.set_paint_property(id, key, None)?;
        }
        touched |= !paint.is_empty();

        if !equals_opt(props.filter.as_ref(), old.filter.as_ref()) {
            engine.set_filter(id, props.filter.as_ref().filter(|f| !f.is_null()))?;
            touched = true;
        }

        if props.minzoom != old.minzoom || props.maxzoom != old.maxzoom {
            engine.set_layer_zoom_range(id, props.minzoom, props.maxzoom)?;
            touched = true;
        }

        Ok(if touched {
            Reconciled::Updated
        } else {
            Reconciled::Unchanged
        })
    }

    fn bind_gestures(&mut self, map: &mut MapInstance) {
        if !self.listeners.is_empty() {
            return;
        }
        let target = EventTarget::Layer(self.id.clone());
        for gesture in GestureKind::ALL {
            let route = Route::Layer {
                layer_id: self.id.clone(),
                gesture,
                handlers: self.handlers.clone(),
            };
            let listener = map.listen(gesture.name(), &target, route);
            self.listeners.push(listener);
        }
    }

    /// Unbinds the gesture listeners, then removes the layer
    ///
    /// Routes are dropped immediately so no further event reaches the
    /// handlers. The engine-side unbind and the removal run on the next idle
    /// flush, after any in-flight dispatch. Reconciling again before that
    /// flush keeps the layer.
    pub fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        map.cancel_task(&self.ready_key());
        let listeners = std::mem::take(&mut self.listeners);
        for listener in &listeners {
            map.router_mut().remove(*listener);
        }
        let token = CancelToken::new();
        if let Some((previous, _)) = self
            .pending_removal
            .replace((token.clone(), self.applied.take()))
        {
            previous.cancel();
        }

        let id = self.id.clone();
        map.defer(Box::new(move |engine| {
            for listener in listeners {
                engine.off(listener);
            }
            if token.is_cancelled() {
                return;
            }
            if engine.has_layer(&id) {
                log::debug!("removing layer `{}`", id);
                if let Err(err) = engine.remove_layer(&id) {
                    log::warn!("removing layer `{}` failed: {}", id, err);
                }
            }
        }));
        Ok(Reconciled::Removed)
    }
}

impl Binder for LayerBinder {
    type Props = LayerProps;

    fn id(&self) -> &str {
        &self.id
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: LayerProps) -> Result<Reconciled> {
        LayerBinder::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        LayerBinder::teardown(self, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MapProps;
    use crate::core::geo::{LngLat, Point};
    use crate::input::events::MapEvent;
    use crate::testing::{EngineCall, EngineProbe, RecordingEngine};
    use crate::traits::ContainerElement;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    fn setup() -> (BindingContext, MapInstance, EngineProbe) {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let factory = engine.into_factory();
        let mut context = BindingContext::new();
        let mut map = context
            .create(
                &factory,
                MapProps::default(),
                Arc::new(Mutex::new(ContainerElement::new("map"))),
            )
            .unwrap();
        map.engine_mut()
            .add_source("points", json!({"type": "geojson"}))
            .unwrap();
        probe.clear_calls();
        (context, map, probe)
    }

    fn circle_layer() -> LayerProps {
        LayerProps::new(LayerType::Circle)
            .with_id("dots")
            .with_source("points")
            .with_paint("a", json!(1))
            .with_paint("b", json!(2))
    }

    #[test]
    fn test_create_strips_before_id() {
        let (mut context, mut map, probe) = setup();
        map.engine_mut()
            .add_layer(json!({"id": "labels", "type": "symbol"}), None)
            .unwrap();
        let props = circle_layer().with_before("labels");
        let mut binder = LayerBinder::new(&props, None, &mut context);
        assert_eq!(
            binder.reconcile(&mut map, props).unwrap(),
            Reconciled::Created
        );
        let layer = probe.layer("dots").unwrap();
        assert!(layer.get("beforeId").is_none());
        assert_eq!(layer["source"], json!("points"));
        assert_eq!(probe.layer_ids(), vec!["dots", "labels"]);
        assert_eq!(probe.layer_listener_count("dots"), 10);
    }

    #[test]
    fn test_paint_update_is_minimal() {
        let (mut context, mut map, probe) = setup();
        let props = circle_layer();
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props).unwrap();
        probe.clear_calls();

        let next = LayerProps::new(LayerType::Circle)
            .with_id("dots")
            .with_source("points")
            .with_paint("a", json!(1))
            .with_paint("b", json!(3))
            .with_paint("c", json!(4));
        assert_eq!(
            binder.reconcile(&mut map, next).unwrap(),
            Reconciled::Updated
        );
        assert_eq!(
            probe.mutations(),
            vec![
                EngineCall::SetPaintProperty("dots".into(), "b".into(), Some(json!(3))),
                EngineCall::SetPaintProperty("dots".into(), "c".into(), Some(json!(4))),
            ]
        );
    }

    #[test]
    fn test_second_pass_is_silent() {
        let (mut context, mut map, probe) = setup();
        let props = circle_layer()
            .with_layout("visibility", json!("visible"))
            .with_filter(json!(["==", "kind", "a"]));
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props.clone()).unwrap();
        probe.clear_calls();
        assert_eq!(
            binder.reconcile(&mut map, props).unwrap(),
            Reconciled::Unchanged
        );
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_update_order_and_clears() {
        let (mut context, mut map, probe) = setup();
        map.engine_mut()
            .add_layer(json!({"id": "top", "type": "symbol"}), None)
            .unwrap();
        let props = circle_layer().with_layout("visibility", json!("none"));
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props).unwrap();
        probe.clear_calls();

        let next = LayerProps::new(LayerType::Circle)
            .with_id("dots")
            .with_source("points")
            .with_before("top")
            .with_paint("a", json!(5))
            .with_paint("b", json!(2))
            .with_filter(json!(["has", "name"]))
            .with_zoom_range(Some(3.0), None);
        binder.reconcile(&mut map, next).unwrap();

        let order: Vec<&str> = probe.mutations().iter().map(EngineCall::name).collect();
        assert_eq!(
            order,
            vec![
                "move_layer",
                "set_layout_property",
                "set_paint_property",
                "set_filter",
                "set_layer_zoom_range"
            ]
        );
        assert_eq!(
            probe.calls_named("set_layout_property")[0],
            EngineCall::SetLayoutProperty("dots".into(), "visibility".into(), None)
        );
        assert_eq!(probe.layer_ids(), vec!["dots", "top"]);
    }

    #[test]
    fn test_deferred_until_source_registered() {
        let (mut context, mut map, probe) = setup();
        let props = LayerProps::new(LayerType::Line);
        let mut binder = LayerBinder::new(&props, Some("roads"), &mut context);
        assert_eq!(binder.id(), "layer-1");
        assert_eq!(
            binder.reconcile(&mut map, props.clone()).unwrap(),
            Reconciled::Deferred
        );
        assert!(probe.layer_ids().is_empty());

        map.engine_mut()
            .add_source("roads", json!({"type": "vector"}))
            .unwrap();
        let report = map.tick();
        assert!(report.completed.contains(&"layer:layer-1".to_string()));
        assert_eq!(
            binder.reconcile(&mut map, props).unwrap(),
            Reconciled::Created
        );
        assert_eq!(probe.layer("layer-1").unwrap()["source"], json!("roads"));
    }

    #[test]
    fn test_gesture_gets_features_and_current_handler() {
        let (mut context, mut map, probe) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let props = circle_layer().on(GestureKind::Click, move |event| {
            assert_eq!(event.features.len(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props).unwrap();
        probe.set_rendered_features("dots", vec![json!({"id": 7})]);

        probe.emit_layer(
            "dots",
            MapEvent::gesture(GestureKind::Click, Point::new(1.0, 1.0), LngLat::new(0.0, 0.0)),
        );
        map.process_events();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Handler removed: no rebinding, the event is dropped
        binder.reconcile(&mut map, circle_layer()).unwrap();
        probe.emit_layer(
            "dots",
            MapEvent::gesture(GestureKind::Click, Point::new(1.0, 1.0), LngLat::new(0.0, 0.0)),
        );
        map.process_events();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(probe.layer_listener_count("dots"), 10);
    }

    #[test]
    fn test_default_hover_cursor() {
        let (mut context, mut map, probe) = setup();
        let props = circle_layer();
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props).unwrap();

        let at = (Point::new(0.0, 0.0), LngLat::new(0.0, 0.0));
        probe.emit_layer("dots", MapEvent::gesture(GestureKind::MouseEnter, at.0, at.1));
        map.process_events();
        assert_eq!(probe.cursor().as_deref(), Some("pointer"));
        probe.emit_layer("dots", MapEvent::gesture(GestureKind::MouseLeave, at.0, at.1));
        map.process_events();
        assert_eq!(probe.cursor().as_deref(), Some("grab"));
    }

    #[test]
    fn test_teardown_unbinds_before_removal() {
        let (mut context, mut map, probe) = setup();
        let props = circle_layer();
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props).unwrap();
        probe.clear_calls();

        binder.teardown(&mut map).unwrap();
        assert!(probe.calls().is_empty());
        assert!(probe.layer("dots").is_some());

        map.tick();
        let names: Vec<&str> = probe.calls().iter().map(EngineCall::name).collect();
        assert_eq!(names.len(), 11);
        assert!(names[..10].iter().all(|name| *name == "off"));
        assert_eq!(names[10], "remove_layer");
        assert_eq!(probe.layer_listener_count("dots"), 0);
    }

    #[test]
    fn test_redeclared_before_flush_survives() {
        let (mut context, mut map, probe) = setup();
        let props = circle_layer();
        let mut binder = LayerBinder::new(&props, None, &mut context);
        binder.reconcile(&mut map, props.clone()).unwrap();

        binder.teardown(&mut map).unwrap();
        let restyled = props.with_paint("b", json!(3));
        assert_eq!(
            binder.reconcile(&mut map, restyled).unwrap(),
            Reconciled::Updated
        );
        probe.clear_calls();

        map.tick();
        assert!(probe.calls_named("remove_layer").is_empty());
        assert_eq!(probe.layer("dots").unwrap()["paint"]["b"], json!(3));
        assert_eq!(probe.layer_listener_count("dots"), 10);
        assert_eq!(binder.bound_gestures(), 10);

        binder.teardown(&mut map).unwrap();
        map.tick();
        assert!(probe.layer("dots").is_none());
    }
}
