//! Draw mode contract
//!
//! A mode is an explicit state machine: `on_setup` when entered, one handler
//! per input kind while active, `on_stop` when left. Modes never hold the
//! engine or the feature store; every handler receives a [`ModeContext`]
//! that lends them for the duration of the call.

use crate::{
    core::geo::LngLat,
    data::geojson::{Feature, Geometry},
    input::events::{GestureKind, MapEvent, MapEventKind},
    plugins::{
        draw::{
            feature::{DrawFeature, ShapeKind},
            store::FeatureStore,
            DrawConfig, DrawEvent, DrawEventKind,
        },
        measure::RangingRegistry,
    },
    traits::{Interaction, MapEngine},
    Result,
};

/// Pointer and keyboard input a draw mode reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum DrawInput {
    MouseDown(LngLat),
    MouseUp(LngLat),
    MouseMove(LngLat),
    /// Pointer moved with the primary button held
    Drag(LngLat),
    Click(LngLat),
    DoubleClick(LngLat),
    KeyUp(String),
}

impl DrawInput {
    /// Translates an engine event; events without a position are ignored
    pub fn from_event(event: &MapEvent) -> Option<Self> {
        if event.kind == MapEventKind::KeyUp {
            return event.key.clone().map(DrawInput::KeyUp);
        }
        let at = event.lng_lat?;
        let input = match event.gesture_kind()? {
            GestureKind::MouseDown => DrawInput::MouseDown(at),
            GestureKind::MouseUp => DrawInput::MouseUp(at),
            GestureKind::MouseMove if event.buttons & 1 != 0 => DrawInput::Drag(at),
            GestureKind::MouseMove => DrawInput::MouseMove(at),
            GestureKind::Click => DrawInput::Click(at),
            GestureKind::DblClick => DrawInput::DoubleClick(at),
            _ => return None,
        };
        Some(input)
    }
}

/// Options a mode is entered with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeOptions {
    /// Features to select (simple_select) or edit (direct_select)
    pub feature_ids: Vec<String>,
    /// Line drawing measures distances
    pub ranging: bool,
    /// Circle drawing replaces the previous circle
    pub override_previous: bool,
}

impl ModeOptions {
    pub fn select(feature_ids: Vec<String>) -> Self {
        Self {
            feature_ids,
            ..Self::default()
        }
    }

    pub fn feature(feature_id: impl Into<String>) -> Self {
        Self::select(vec![feature_id.into()])
    }
}

/// A requested transition
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    pub name: String,
    pub options: ModeOptions,
}

/// Everything a mode handler may touch while it runs
pub struct ModeContext<'a> {
    pub(crate) engine: &'a mut dyn MapEngine,
    pub(crate) store: &'a mut FeatureStore,
    pub(crate) ranging: &'a mut RangingRegistry,
    pub(crate) config: &'a DrawConfig,
    pub(crate) last_circle: &'a mut Option<String>,
    pub(crate) events: &'a mut Vec<DrawEvent>,
    pub(crate) change: &'a mut Option<ModeChange>,
}

impl<'a> ModeContext<'a> {
    pub fn engine(&mut self) -> &mut dyn MapEngine {
        &mut *self.engine
    }

    pub fn config(&self) -> &DrawConfig {
        self.config
    }

    pub fn store(&self) -> &FeatureStore {
        self.store
    }

    pub fn feature(&self, id: &str) -> Option<&DrawFeature> {
        self.store.get(id)
    }

    /// Adds a new feature and returns its id
    pub fn add_feature(&mut self, geometry: Geometry, kind: ShapeKind) -> String {
        let id = self.store.next_id();
        self.store
            .insert(DrawFeature::new(id.clone(), geometry, kind));
        id
    }

    /// Applies `edit` to a feature; false when it no longer exists
    pub fn update_feature<F>(&mut self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut DrawFeature, &DrawConfig),
    {
        let config = self.config;
        match self.store.get_mut(id) {
            Some(feature) => {
                edit(feature, config);
                true
            }
            None => false,
        }
    }

    /// Removes features together with any ranging overlays they own
    ///
    /// A silent delete fires no event.
    pub fn delete_features(&mut self, ids: &[String], silent: bool) -> Vec<DrawFeature> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(feature) = self.store.remove(id) {
                self.ranging.remove(&mut *self.engine, id);
                removed.push(feature);
            }
        }
        if !silent && !removed.is_empty() {
            self.emit(DrawEventKind::Delete, removed.clone(), None);
        }
        removed
    }

    pub fn emit(&mut self, kind: DrawEventKind, features: Vec<DrawFeature>, action: Option<&str>) {
        self.events.push(DrawEvent {
            kind,
            features,
            action: action.map(str::to_string),
        });
    }

    /// Replaces the selection, firing a selection change when it differs
    pub fn select(&mut self, ids: Vec<String>) {
        if self.store.set_selected(ids) {
            let selected = self.store.selected().into_iter().cloned().collect();
            self.emit(DrawEventKind::SelectionChange, selected, None);
        }
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.store.selected_ids().to_vec()
    }

    /// Requests a transition once the current handler returns
    pub fn change_mode(&mut self, name: &str, options: ModeOptions) {
        *self.change = Some(ModeChange {
            name: name.to_string(),
            options,
        });
    }

    pub fn set_drag_pan(&mut self, enabled: bool) {
        self.engine.set_interaction(Interaction::DragPan, enabled);
    }

    pub fn set_double_click_zoom(&mut self, enabled: bool) {
        self.engine
            .set_interaction(Interaction::DoubleClickZoom, enabled);
    }

    pub fn set_cursor(&mut self, cursor: &str) {
        self.engine.set_cursor(cursor);
    }

    /// Topmost feature under `at`, within the configured tolerance
    pub fn hit(&self, at: LngLat) -> Option<String> {
        self.store
            .hit(at, self.config.hit_tolerance)
            .map(|feature| feature.id.clone())
    }

    pub fn is_near(&self, a: LngLat, b: LngLat) -> bool {
        a.approx_eq(&b, self.config.hit_tolerance)
    }
}

/// One interactive draw mode
///
/// Every handler defaults to doing nothing, so a mode implements only the
/// inputs it reacts to.
pub trait DrawMode: Send {
    fn name(&self) -> &str;

    fn on_setup(&mut self, _ctx: &mut ModeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &mut ModeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_mouse_down(&mut self, _ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        Ok(())
    }

    fn on_mouse_up(&mut self, _ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        Ok(())
    }

    fn on_mouse_move(&mut self, _ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        Ok(())
    }

    fn on_drag(&mut self, _ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        Ok(())
    }

    fn on_click(&mut self, _ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        Ok(())
    }

    fn on_double_click(&mut self, _ctx: &mut ModeContext<'_>, _at: LngLat) -> Result<()> {
        Ok(())
    }

    fn on_key_up(&mut self, _ctx: &mut ModeContext<'_>, _key: &str) -> Result<()> {
        Ok(())
    }

    /// Delete or Backspace was released
    fn on_trash(&mut self, _ctx: &mut ModeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Rendered features for one stored feature
    fn display(&self, feature: &DrawFeature, selected: bool, out: &mut Vec<Feature>) {
        out.push(feature.display(selected));
    }
}

/// Routes one input to the matching handler
pub fn dispatch(mode: &mut dyn DrawMode, ctx: &mut ModeContext<'_>, input: &DrawInput) -> Result<()> {
    match input {
        DrawInput::MouseDown(at) => mode.on_mouse_down(ctx, *at),
        DrawInput::MouseUp(at) => mode.on_mouse_up(ctx, *at),
        DrawInput::MouseMove(at) => mode.on_mouse_move(ctx, *at),
        DrawInput::Drag(at) => mode.on_drag(ctx, *at),
        DrawInput::Click(at) => mode.on_click(ctx, *at),
        DrawInput::DoubleClick(at) => mode.on_double_click(ctx, *at),
        DrawInput::KeyUp(key) if key == "Delete" || key == "Backspace" => mode.on_trash(ctx),
        DrawInput::KeyUp(key) => mode.on_key_up(ctx, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Point;

    #[test]
    fn test_input_from_events() {
        let at = LngLat::new(1.0, 2.0);
        let moved = MapEvent::gesture(GestureKind::MouseMove, Point::new(0.0, 0.0), at);
        assert_eq!(DrawInput::from_event(&moved), Some(DrawInput::MouseMove(at)));
        assert_eq!(
            DrawInput::from_event(&moved.clone().with_buttons(1)),
            Some(DrawInput::Drag(at))
        );
        assert_eq!(
            DrawInput::from_event(&MapEvent::key_up("Escape")),
            Some(DrawInput::KeyUp("Escape".into()))
        );
        let enter = MapEvent::gesture(GestureKind::MouseEnter, Point::new(0.0, 0.0), at);
        assert_eq!(DrawInput::from_event(&enter), None);
    }
}
