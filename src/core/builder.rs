//! Fluent construction of [`MapProps`]

use crate::{
    core::{config::MapProps, geo::LngLat},
    input::events::{MapEvent, MapEventKind},
};
use serde_json::Value;

/// Builder for declaring map props
#[derive(Debug, Default)]
pub struct MapPropsBuilder {
    props: MapProps,
}

impl MapPropsBuilder {
    /// Create a new MapPropsBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial center and zoom level
    pub fn with_center_and_zoom(mut self, center: LngLat, zoom: f64) -> Self {
        self.props.center = Some(center);
        self.props.zoom = Some(zoom);
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.props.pitch = Some(pitch);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.props.bearing = Some(bearing);
        self
    }

    /// Set zoom constraints
    pub fn with_zoom_limits(mut self, min_zoom: Option<f64>, max_zoom: Option<f64>) -> Self {
        self.props.min_zoom = min_zoom;
        self.props.max_zoom = max_zoom;
        self
    }

    pub fn with_min_pitch(mut self, min_pitch: f64) -> Self {
        self.props.min_pitch = Some(min_pitch);
        self
    }

    pub fn with_max_bounds(mut self, bounds: Value) -> Self {
        self.props.max_bounds = Some(bounds);
        self
    }

    pub fn with_render_world_copies(mut self, enabled: bool) -> Self {
        self.props.render_world_copies = Some(enabled);
        self
    }

    /// Style document or URL, applied with diffing unless disabled
    pub fn with_style(mut self, style: Value) -> Self {
        self.props.map_style = Some(style);
        self
    }

    pub fn with_style_diff(mut self, diff: bool) -> Self {
        self.props.diff = Some(diff);
        self
    }

    pub fn with_ideograph_font(mut self, family: impl Into<String>) -> Self {
        self.props.local_ideograph_font_family = Some(family.into());
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.props.cursor = Some(cursor.into());
        self
    }

    pub fn with_fog(mut self, fog: Value) -> Self {
        self.props.fog = Some(fog);
        self
    }

    pub fn with_light(mut self, light: Value) -> Self {
        self.props.light = Some(light);
        self
    }

    pub fn with_terrain(mut self, terrain: Value) -> Self {
        self.props.terrain = Some(terrain);
        self
    }

    /// Return the instance to the pool on unmount instead of destroying it
    pub fn reuse(mut self) -> Self {
        self.props.reuse = true;
        self
    }

    /// Borrow an already pooled instance
    pub fn canuse(mut self) -> Self {
        self.props.canuse = true;
        self
    }

    /// Pass an engine constructor option through untouched
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.options.insert(key.into(), value);
        self
    }

    pub fn on<F>(mut self, kind: MapEventKind, callback: F) -> Self
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.props.handlers.on(kind, callback);
        self
    }

    pub fn build(self) -> MapProps {
        self.props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MountIntent;
    use serde_json::json;

    #[test]
    fn test_builder_fills_props() {
        let props = MapPropsBuilder::new()
            .with_center_and_zoom(LngLat::new(116.4, 39.9), 10.0)
            .with_zoom_limits(Some(2.0), None)
            .with_style(json!("style.json"))
            .with_terrain(json!({"source": "dem"}))
            .with_option("hash", json!(true))
            .on(MapEventKind::Load, |_| {})
            .reuse()
            .build();
        assert_eq!(props.zoom, Some(10.0));
        assert_eq!(props.min_zoom, Some(2.0));
        assert_eq!(props.max_zoom, None);
        assert_eq!(props.terrain_source(), Some("dem"));
        assert_eq!(props.intent(), MountIntent::Reuse);
        assert!(props.handlers.contains(&MapEventKind::Load));
    }
}
