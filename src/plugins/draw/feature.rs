//! Draw features and their parametric shape kinds
//!
//! A circle, rectangle or arrow is described by a handful of control points.
//! The displayed geometry of such a feature is always regenerated from those
//! points; only generic features have their coordinates edited directly.

use crate::{
    core::geo::{self, LngLat},
    data::geojson::{CoordPath, Feature, Geometry},
    plugins::draw::DrawConfig,
    MapError, Result,
};
use serde_json::{json, Map, Value};

/// Parametric description of a drawn shape
///
/// Control points are unset while the shape is still being placed.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Radius is in kilometers
    Circle { center: Option<LngLat>, radius: f64 },
    /// Two opposite corners of an axis-aligned rectangle
    Rect {
        corner: Option<LngLat>,
        opposite: Option<LngLat>,
    },
    Arrow {
        start: Option<LngLat>,
        end: Option<LngLat>,
    },
    /// Plain point, line or polygon
    Generic,
}

impl ShapeKind {
    pub fn circle() -> Self {
        ShapeKind::Circle {
            center: None,
            radius: 0.0,
        }
    }

    pub fn rect() -> Self {
        ShapeKind::Rect {
            corner: None,
            opposite: None,
        }
    }

    pub fn arrow() -> Self {
        ShapeKind::Arrow {
            start: None,
            end: None,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, ShapeKind::Generic)
    }

    /// Geometry implied by the control points, once enough of them are set
    pub fn outline(&self, config: &DrawConfig) -> Option<Geometry> {
        match *self {
            ShapeKind::Circle {
                center: Some(center),
                radius,
            } => Some(Geometry::Polygon {
                coordinates: vec![geo::circle_ring(center, radius, config.circle_steps)],
            }),
            ShapeKind::Rect {
                corner: Some(corner),
                opposite: Some(opposite),
            } => Some(Geometry::Polygon {
                coordinates: vec![geo::envelope_ring(corner, opposite)],
            }),
            ShapeKind::Arrow {
                start: Some(start),
                end: Some(end),
            } => Some(Geometry::MultiLineString {
                coordinates: geo::arrow_lines(
                    start,
                    end,
                    config.arrow_head_km,
                    config.arrow_spread_deg,
                ),
            }),
            _ => None,
        }
    }

    pub fn translate(&mut self, delta: LngLat) {
        let points = match self {
            ShapeKind::Circle { center, .. } => vec![center],
            ShapeKind::Rect { corner, opposite } => vec![corner, opposite],
            ShapeKind::Arrow { start, end } => vec![start, end],
            ShapeKind::Generic => Vec::new(),
        };
        for point in points.into_iter().flatten() {
            *point = point.translate(delta);
        }
    }

    fn is_complete(&self) -> bool {
        match *self {
            ShapeKind::Circle { center, radius } => center.is_some() && radius > 0.0,
            ShapeKind::Rect {
                corner: Some(a),
                opposite: Some(b),
            } => a.lng != b.lng && a.lat != b.lat,
            ShapeKind::Arrow {
                start: Some(a),
                end: Some(b),
            } => a != b,
            ShapeKind::Generic => true,
            _ => false,
        }
    }
}

/// What a vertex drag acts on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grip {
    /// Any circle handle; dragging sets the radius
    Radius,
    /// The rectangle corner stored as `corner`; `opposite` stays put
    Corner,
    Opposite,
    ArrowStart,
    ArrowEnd,
    Vertex(CoordPath),
}

/// One feature held by the draw control
#[derive(Debug, Clone, PartialEq)]
pub struct DrawFeature {
    pub id: String,
    pub geometry: Geometry,
    pub kind: ShapeKind,
    /// Measured with the ranging tool; such lines cannot be moved
    pub ranging: bool,
    /// User properties, exported alongside the shape keys
    pub properties: Map<String, Value>,
}

impl DrawFeature {
    pub fn new(id: impl Into<String>, geometry: Geometry, kind: ShapeKind) -> Self {
        Self {
            id: id.into(),
            geometry,
            kind,
            ranging: false,
            properties: Map::new(),
        }
    }

    pub fn generic(id: impl Into<String>, geometry: Geometry) -> Self {
        Self::new(id, geometry, ShapeKind::Generic)
    }

    /// Regenerates the geometry from the control points
    pub fn refresh(&mut self, config: &DrawConfig) {
        if let Some(geometry) = self.kind.outline(config) {
            self.geometry = geometry;
        }
    }

    pub fn translate(&mut self, delta: LngLat, config: &DrawConfig) {
        if self.kind.is_generic() {
            self.geometry.translate(delta);
        } else {
            self.kind.translate(delta);
            self.refresh(config);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.geometry.is_valid() && self.kind.is_complete()
    }

    /// Vertex handles shown while the feature is selected
    ///
    /// Circles show four ring points a quarter turn apart, rectangles their
    /// two control corners, arrows their start and tip.
    pub fn handles(&self) -> Vec<(CoordPath, LngLat)> {
        let vertices = self.geometry.vertices();
        match self.kind {
            ShapeKind::Circle { center: None, .. } => Vec::new(),
            ShapeKind::Circle { .. } => {
                let step = (vertices.len() / 4).max(1);
                vertices.into_iter().step_by(step).take(4).collect()
            }
            ShapeKind::Rect { corner, opposite } => vertices
                .into_iter()
                .filter(|(_, vertex)| Some(*vertex) == corner || Some(*vertex) == opposite)
                .take(2)
                .collect(),
            ShapeKind::Arrow { start, end } => [
                (CoordPath::new(0, 0), start),
                (CoordPath::new(0, 1), end),
            ]
            .into_iter()
            .filter_map(|(path, point)| point.map(|point| (path, point)))
            .collect(),
            ShapeKind::Generic => vertices,
        }
    }

    /// Resolves the handle at `path` to the control point it drags
    pub fn grab(&self, path: CoordPath) -> Option<Grip> {
        let vertex = self.geometry.vertex(path)?;
        match self.kind {
            ShapeKind::Circle { .. } => Some(Grip::Radius),
            ShapeKind::Rect { corner, .. } => Some(if Some(vertex) == corner {
                Grip::Corner
            } else {
                Grip::Opposite
            }),
            ShapeKind::Arrow { .. } => Some(if path.index == 0 {
                Grip::ArrowStart
            } else {
                Grip::ArrowEnd
            }),
            ShapeKind::Generic => Some(Grip::Vertex(path)),
        }
    }

    /// Moves a grabbed handle to `at` and rebuilds the shape from it
    pub fn drag_grip(&mut self, grip: Grip, at: LngLat, config: &DrawConfig) {
        match (&mut self.kind, grip) {
            (ShapeKind::Circle { center: Some(center), radius }, Grip::Radius) => {
                *radius = geo::distance_km(*center, at);
            }
            (ShapeKind::Rect { corner, .. }, Grip::Corner) => *corner = Some(at),
            (ShapeKind::Rect { opposite, .. }, Grip::Opposite) => *opposite = Some(at),
            (ShapeKind::Arrow { start, .. }, Grip::ArrowStart) => *start = Some(at),
            (ShapeKind::Arrow { end, .. }, Grip::ArrowEnd) => *end = Some(at),
            (ShapeKind::Generic, Grip::Vertex(path)) => {
                self.geometry.set_vertex(path, at);
                return;
            }
            _ => return,
        }
        self.refresh(config);
    }

    /// Properties as exported, shape keys included
    pub fn export_properties(&self) -> Map<String, Value> {
        let mut properties = self.properties.clone();
        match &self.kind {
            ShapeKind::Circle { center, radius } => {
                properties.insert("isCircle".into(), json!(true));
                properties.insert("center".into(), position(*center));
                properties.insert("radius".into(), json!(radius));
            }
            ShapeKind::Rect { corner, opposite } => {
                properties.insert("isRect".into(), json!(true));
                properties.insert("point".into(), position(*corner));
                properties.insert("endPoint".into(), position(*opposite));
            }
            ShapeKind::Arrow { start, end } => {
                properties.insert("isArrow".into(), json!(true));
                properties.insert("start".into(), position(*start));
                properties.insert("end".into(), position(*end));
            }
            ShapeKind::Generic => {}
        }
        if self.ranging {
            properties.insert("ranging".into(), json!(true));
        }
        properties
    }

    pub fn to_feature(&self) -> Feature {
        Feature {
            id: Some(json!(self.id)),
            geometry: Some(self.geometry.clone()),
            properties: self.export_properties(),
        }
    }

    pub fn to_geojson(&self) -> Result<Value> {
        Ok(serde_json::to_value(crate::data::GeoJson::Feature(
            self.to_feature(),
        ))?)
    }

    /// Rebuilds a draw feature from its exported form
    pub fn from_feature(feature: &Feature, fallback_id: impl Into<String>) -> Result<Self> {
        let geometry = feature
            .geometry
            .clone()
            .ok_or_else(|| MapError::Draw("feature has no geometry".to_string()))?;
        let id = match &feature.id {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => fallback_id.into(),
        };
        let mut properties = feature.properties.clone();
        let flag = |properties: &mut Map<String, Value>, key: &str| {
            properties.remove(key).and_then(|v| v.as_bool()).unwrap_or(false)
        };
        let kind = if flag(&mut properties, "isCircle") {
            ShapeKind::Circle {
                center: take_position(&mut properties, "center"),
                radius: properties
                    .remove("radius")
                    .and_then(|radius| radius.as_f64())
                    .unwrap_or(0.0),
            }
        } else if flag(&mut properties, "isRect") {
            ShapeKind::Rect {
                corner: take_position(&mut properties, "point"),
                opposite: take_position(&mut properties, "endPoint"),
            }
        } else if flag(&mut properties, "isArrow") {
            ShapeKind::Arrow {
                start: take_position(&mut properties, "start"),
                end: take_position(&mut properties, "end"),
            }
        } else {
            ShapeKind::Generic
        };
        let ranging = flag(&mut properties, "ranging");
        Ok(Self {
            id,
            geometry,
            kind,
            ranging,
            properties,
        })
    }

    /// Rendered form, with user properties prefixed as `user_*`
    pub fn display(&self, active: bool) -> Feature {
        let mut properties = Map::new();
        for (key, value) in self.export_properties() {
            properties.insert(format!("user_{}", key), value);
        }
        properties.insert("id".into(), json!(self.id));
        properties.insert("meta".into(), json!("feature"));
        properties.insert("active".into(), json!(active.to_string()));
        Feature {
            id: None,
            geometry: Some(self.geometry.clone()),
            properties,
        }
    }
}

/// Rendered vertex handle of a selected feature
pub fn vertex_display(parent: &str, path: CoordPath, at: LngLat, active: bool) -> Feature {
    let mut properties = Map::new();
    properties.insert("meta".into(), json!("vertex"));
    properties.insert("parent".into(), json!(parent));
    properties.insert("coord_path".into(), json!(path.to_string()));
    properties.insert("active".into(), json!(active.to_string()));
    Feature {
        id: None,
        geometry: Some(Geometry::Point { coordinates: at }),
        properties,
    }
}

fn position(point: Option<LngLat>) -> Value {
    match point {
        Some(point) => json!(point),
        None => json!([]),
    }
}

fn take_position(properties: &mut Map<String, Value>, key: &str) -> Option<LngLat> {
    properties
        .remove(key)
        .and_then(|value| serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DrawConfig {
        DrawConfig::default()
    }

    fn circle(center: LngLat, radius: f64) -> DrawFeature {
        let mut feature = DrawFeature::new(
            "c",
            Geometry::empty_polygon(),
            ShapeKind::Circle {
                center: Some(center),
                radius,
            },
        );
        feature.refresh(&config());
        feature
    }

    fn ring_radii(feature: &DrawFeature) -> Vec<f64> {
        let ShapeKind::Circle {
            center: Some(center),
            ..
        } = feature.kind
        else {
            panic!("not a placed circle");
        };
        feature
            .geometry
            .vertices()
            .iter()
            .map(|(_, vertex)| geo::distance_km(center, *vertex))
            .collect()
    }

    #[test]
    fn test_circle_handles_are_quarter_turns() {
        let feature = circle(LngLat::new(116.4, 39.9), 1.0);
        let paths: Vec<usize> = feature.handles().iter().map(|(p, _)| p.index).collect();
        assert_eq!(paths, vec![0, 16, 32, 48]);
    }

    #[test]
    fn test_circle_translate_keeps_ring_on_radius() {
        let mut feature = circle(LngLat::new(10.0, 20.0), 2.0);
        feature.translate(LngLat::new(5.0, 30.0), &config());
        assert_eq!(
            feature.kind,
            ShapeKind::Circle {
                center: Some(LngLat::new(15.0, 50.0)),
                radius: 2.0
            }
        );
        for radius in ring_radii(&feature) {
            assert!((radius - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rect_corner_drag_keeps_opposite() {
        let mut feature = DrawFeature::new(
            "r",
            Geometry::empty_polygon(),
            ShapeKind::Rect {
                corner: Some(LngLat::new(0.0, 0.0)),
                opposite: Some(LngLat::new(1.0, 1.0)),
            },
        );
        feature.refresh(&config());
        assert_eq!(feature.handles().len(), 2);
        let grip = feature.grab(CoordPath::new(0, 2)).unwrap();
        assert_eq!(grip, Grip::Opposite);
        feature.drag_grip(grip, LngLat::new(2.0, 3.0), &config());
        assert_eq!(
            feature.geometry.vertex(CoordPath::new(0, 2)),
            Some(LngLat::new(2.0, 3.0))
        );
        assert_eq!(
            feature.geometry.vertex(CoordPath::new(0, 0)),
            Some(LngLat::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_export_and_import_shape_keys() {
        let mut feature = circle(LngLat::new(1.0, 2.0), 0.5);
        feature.properties.insert("custom".into(), json!(true));
        let exported = feature.to_feature();
        assert_eq!(exported.properties["isCircle"], json!(true));
        assert_eq!(exported.properties["center"], json!([1.0, 2.0]));
        assert_eq!(exported.properties["radius"], json!(0.5));

        let imported = DrawFeature::from_feature(&exported, "unused").unwrap();
        assert_eq!(imported, feature);
    }

    #[test]
    fn test_unplaced_shape_exports_empty_points() {
        let feature = DrawFeature::new("a", Geometry::empty_polygon(), ShapeKind::rect());
        let properties = feature.export_properties();
        assert_eq!(properties["point"], json!([]));
        assert!(!feature.is_valid());
    }
}
