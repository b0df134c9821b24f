use crate::{
    core::{diff::equals_opt, geo::LngLat, map::MapInstance},
    input::{
        events::{GestureKind, MapEvent, MapEventKind},
        handler::{replace_shared, HandlerTable, Route, SharedHandlers},
    },
    layers::{Binder, Reconciled},
    traits::{EventTarget, ListenerId, Overlay, OverlayContent, OverlayId, OverlayUpdate},
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn default_true() -> bool {
    true
}

fn default_alignment() -> String {
    "auto".to_string()
}

/// Declared marker widget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerProps {
    pub lng_lat: LngLat,
    /// Host element key; the engine's default pin when absent
    pub element: Option<String>,
    /// `[x, y]` pixel offset
    pub offset: Option<Value>,
    pub anchor: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_alignment")]
    pub rotation_alignment: String,
    #[serde(default = "default_alignment")]
    pub pitch_alignment: String,
    #[serde(default = "default_true")]
    pub draggable: bool,
    #[serde(skip)]
    pub handlers: HandlerTable,
}

impl MarkerProps {
    pub fn new(lng_lat: LngLat) -> Self {
        Self {
            lng_lat,
            element: None,
            offset: None,
            anchor: None,
            color: None,
            rotation: 0.0,
            rotation_alignment: default_alignment(),
            pitch_alignment: default_alignment(),
            draggable: true,
            handlers: HandlerTable::new(),
        }
    }

    pub fn on_click<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.handlers
            .on(MapEventKind::Gesture(GestureKind::Click), callback);
        self
    }

    fn overlay(&self) -> Overlay {
        let content = OverlayContent::Element(
            self.element.clone().unwrap_or_else(|| "marker".to_string()),
        );
        let mut overlay = Overlay::new(self.lng_lat, content).with_options(json!({
            "anchor": self.anchor,
            "color": self.color,
            "rotation": self.rotation,
            "rotationAlignment": self.rotation_alignment,
            "pitchAlignment": self.pitch_alignment,
            "draggable": self.draggable,
        }));
        if let Some((x, y)) = pixel_offset(self.offset.as_ref()) {
            overlay = overlay.with_offset(x, y);
        }
        overlay
    }
}

pub(crate) fn pixel_offset(offset: Option<&Value>) -> Option<(f64, f64)> {
    let pair = offset?.as_array()?;
    match pair.as_slice() {
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

/// Keeps one marker widget placed and configured
#[derive(Debug)]
pub struct MarkerBinder {
    key: String,
    overlay: Option<OverlayId>,
    applied: Option<MarkerProps>,
    handlers: SharedHandlers,
    listener: Option<ListenerId>,
}

impl MarkerBinder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            overlay: None,
            applied: None,
            handlers: HandlerTable::new().into_shared(),
            listener: None,
        }
    }

    pub fn overlay_id(&self) -> Option<OverlayId> {
        self.overlay
    }

    pub fn reconcile(&mut self, map: &mut MapInstance, props: MarkerProps) -> Result<Reconciled> {
        replace_shared(&self.handlers, props.handlers.clone());

        let (overlay, old) = match (self.overlay, self.applied.take()) {
            (Some(overlay), Some(old)) => (overlay, old),
            _ => {
                let overlay = map.engine_mut().add_overlay(props.overlay());
                log::debug!("marker `{}` placed as {:?}", self.key, overlay);
                self.listener = Some(map.listen(
                    GestureKind::Click.name(),
                    &EventTarget::Overlay(overlay),
                    Route::Overlay(self.handlers.clone()),
                ));
                self.overlay = Some(overlay);
                self.applied = Some(props);
                return Ok(Reconciled::Created);
            }
        };

        let mut updates = Vec::new();
        if props.lng_lat != old.lng_lat {
            updates.push(OverlayUpdate::LngLat(props.lng_lat));
        }
        if !equals_opt(props.offset.as_ref(), old.offset.as_ref()) {
            updates.push(OverlayUpdate::Offset(
                props.offset.clone().unwrap_or(Value::Null),
            ));
        }
        if props.rotation_alignment != old.rotation_alignment {
            updates.push(OverlayUpdate::RotationAlignment(
                props.rotation_alignment.clone(),
            ));
        }
        if props.rotation != old.rotation {
            updates.push(OverlayUpdate::Rotation(props.rotation));
        }
        if props.pitch_alignment != old.pitch_alignment {
            updates.push(OverlayUpdate::PitchAlignment(props.pitch_alignment.clone()));
        }
        if props.draggable != old.draggable {
            updates.push(OverlayUpdate::Draggable(props.draggable));
        }

        let outcome = if updates.is_empty() {
            Reconciled::Unchanged
        } else {
            Reconciled::Updated
        };
        for update in updates {
            log::trace!("marker `{}`: {:?}", self.key, update);
            map.engine_mut().update_overlay(overlay, update);
        }
        self.applied = Some(props);
        Ok(outcome)
    }

    pub fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        if let Some(listener) = self.listener.take() {
            map.unlisten(listener);
        }
        self.applied = None;
        match self.overlay.take() {
            Some(overlay) => {
                map.engine_mut().remove_overlay(overlay);
                Ok(Reconciled::Removed)
            }
            None => Ok(Reconciled::Unchanged),
        }
    }
}

impl Binder for MarkerBinder {
    type Props = MarkerProps;

    fn id(&self) -> &str {
        &self.key
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: MarkerProps) -> Result<Reconciled> {
        MarkerBinder::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        MarkerBinder::teardown(self, map)
    }
}
