use crate::{
    core::{geo::LngLat, map::MapInstance},
    input::{
        events::{MapEvent, MapEventKind},
        handler::{replace_shared, HandlerTable, Route, SharedHandlers},
    },
    layers::{marker::pixel_offset, Binder, Reconciled},
    traits::{EventTarget, ListenerId, Overlay, OverlayContent, OverlayId, OverlayUpdate},
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn default_true() -> bool {
    true
}

/// Declared popup widget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupProps {
    pub lng_lat: LngLat,
    /// Host content key
    #[serde(default)]
    pub content: String,
    pub offset: Option<Value>,
    pub anchor: Option<String>,
    #[serde(default = "default_true")]
    pub close_button: bool,
    #[serde(default = "default_true")]
    pub close_on_click: bool,
    pub max_width: Option<String>,
    pub class_name: Option<String>,
    #[serde(skip)]
    pub handlers: HandlerTable,
}

impl PopupProps {
    pub fn new(lng_lat: LngLat, content: impl Into<String>) -> Self {
        Self {
            lng_lat,
            content: content.into(),
            offset: None,
            anchor: None,
            close_button: true,
            close_on_click: true,
            max_width: None,
            class_name: None,
            handlers: HandlerTable::new(),
        }
    }

    pub fn on_open<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.handlers.on(MapEventKind::Open, callback);
        self
    }

    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.handlers.on(MapEventKind::Close, callback);
        self
    }

    fn overlay(&self) -> Overlay {
        let mut overlay = Overlay::new(self.lng_lat, OverlayContent::Popup(self.content.clone()))
            .with_options(json!({
                "anchor": self.anchor,
                "closeButton": self.close_button,
                "closeOnClick": self.close_on_click,
                "maxWidth": self.max_width,
                "className": self.class_name,
            }));
        if let Some((x, y)) = pixel_offset(self.offset.as_ref()) {
            overlay = overlay.with_offset(x, y);
        }
        overlay
    }
}

/// Keeps one popup open at its declared position
///
/// Only the position follows prop changes; other options are fixed at
/// creation.
#[derive(Debug)]
pub struct PopupBinder {
    key: String,
    overlay: Option<OverlayId>,
    lng_lat: Option<LngLat>,
    handlers: SharedHandlers,
    listeners: Vec<ListenerId>,
}

impl PopupBinder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            overlay: None,
            lng_lat: None,
            handlers: HandlerTable::new().into_shared(),
            listeners: Vec::new(),
        }
    }

    pub fn overlay_id(&self) -> Option<OverlayId> {
        self.overlay
    }

    pub fn reconcile(&mut self, map: &mut MapInstance, props: PopupProps) -> Result<Reconciled> {
        replace_shared(&self.handlers, props.handlers.clone());

        let Some(overlay) = self.overlay else {
            let overlay = map.engine_mut().add_overlay(props.overlay());
            log::debug!("popup `{}` opened as {:?}", self.key, overlay);
            let target = EventTarget::Overlay(overlay);
            for kind in [MapEventKind::Open, MapEventKind::Close] {
                let listener = map.listen(
                    kind.name(),
                    &target,
                    Route::Overlay(self.handlers.clone()),
                );
                self.listeners.push(listener);
            }
            self.overlay = Some(overlay);
            self.lng_lat = Some(props.lng_lat);
            return Ok(Reconciled::Created);
        };

        if self.lng_lat == Some(props.lng_lat) {
            return Ok(Reconciled::Unchanged);
        }
        map.engine_mut()
            .update_overlay(overlay, OverlayUpdate::LngLat(props.lng_lat));
        self.lng_lat = Some(props.lng_lat);
        Ok(Reconciled::Updated)
    }

    pub fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        for listener in std::mem::take(&mut self.listeners) {
            map.unlisten(listener);
        }
        self.lng_lat = None;
        match self.overlay.take() {
            Some(overlay) => {
                map.engine_mut().remove_overlay(overlay);
                Ok(Reconciled::Removed)
            }
            None => Ok(Reconciled::Unchanged),
        }
    }
}

impl Binder for PopupBinder {
    type Props = PopupProps;

    fn id(&self) -> &str {
        &self.key
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: PopupProps) -> Result<Reconciled> {
        PopupBinder::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        PopupBinder::teardown(self, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{config::MapProps, context::BindingContext};
    use crate::testing::RecordingEngine;
    use crate::traits::ContainerElement;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_popup_follows_position_and_forwards_close() {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let factory = engine.into_factory();
        let mut map = BindingContext::new()
            .create(
                &factory,
                MapProps::default(),
                Arc::new(Mutex::new(ContainerElement::new("map"))),
            )
            .unwrap();

        let closed = Arc::new(Mutex::new(Vec::new()));
        let log = closed.clone();
        let mut binder = PopupBinder::new("info");
        let props = PopupProps::new(LngLat::new(1.0, 1.0), "hello").on_close(move |event| {
            log.lock().unwrap().push(event.kind.name().to_string());
        });
        assert_eq!(
            binder.reconcile(&mut map, props.clone()).unwrap(),
            Reconciled::Created
        );
        assert_eq!(
            binder.reconcile(&mut map, props.clone()).unwrap(),
            Reconciled::Unchanged
        );

        let mut moved = props;
        moved.lng_lat = LngLat::new(2.0, 2.0);
        assert_eq!(
            binder.reconcile(&mut map, moved).unwrap(),
            Reconciled::Updated
        );
        assert_eq!(probe.overlays()[0].1.lng_lat, LngLat::new(2.0, 2.0));

        let overlay = binder.overlay_id().unwrap();
        probe.emit_overlay(overlay, MapEvent::new(MapEventKind::Open));
        probe.emit_overlay(overlay, MapEvent::new(MapEventKind::Close));
        map.process_events();
        assert_eq!(*closed.lock().unwrap(), vec!["close".to_string()]);

        binder.teardown(&mut map).unwrap();
        assert_eq!(probe.overlay_count(), 0);
    }
}
