use crate::core::geo::LngLat;
use geo::{Contains, EuclideanDistance};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// GeoJSON geometries the draw modes produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: LngLat },
    LineString { coordinates: Vec<LngLat> },
    Polygon { coordinates: Vec<Vec<LngLat>> },
    MultiLineString { coordinates: Vec<Vec<LngLat>> },
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Root GeoJSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Feature(Feature),
    FeatureCollection { features: Vec<Feature> },
}

impl GeoJson {
    pub fn parse(geojson_str: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(geojson_str)?)
    }

    pub fn collection(features: Vec<Feature>) -> Self {
        GeoJson::FeatureCollection { features }
    }

    pub fn features(&self) -> Vec<&Feature> {
        match self {
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::FeatureCollection { features } => features.iter().collect(),
        }
    }

    pub fn to_value(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Position of one vertex inside a geometry
///
/// `part` is the ring or line index; it is always 0 for points and line
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordPath {
    pub part: usize,
    pub index: usize,
}

impl CoordPath {
    pub fn new(part: usize, index: usize) -> Self {
        Self { part, index }
    }
}

impl fmt::Display for CoordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.part, self.index)
    }
}

impl Geometry {
    pub fn empty_polygon() -> Self {
        Geometry::Polygon {
            coordinates: vec![Vec::new()],
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::LineString { .. } => "LineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiLineString { .. } => "MultiLineString",
        }
    }

    /// Editable vertices; the closing vertex of a ring is not listed
    pub fn vertices(&self) -> Vec<(CoordPath, LngLat)> {
        match self {
            Geometry::Point { coordinates } => vec![(CoordPath::new(0, 0), *coordinates)],
            Geometry::LineString { coordinates } => indexed(0, coordinates),
            Geometry::Polygon { coordinates } => coordinates
                .iter()
                .enumerate()
                .flat_map(|(part, ring)| {
                    let open = ring.len().saturating_sub(1);
                    indexed(part, &ring[..open])
                })
                .collect(),
            Geometry::MultiLineString { coordinates } => coordinates
                .iter()
                .enumerate()
                .flat_map(|(part, line)| indexed(part, line))
                .collect(),
        }
    }

    pub fn vertex(&self, path: CoordPath) -> Option<LngLat> {
        match self {
            Geometry::Point { coordinates } => (path == CoordPath::new(0, 0)).then_some(*coordinates),
            Geometry::LineString { coordinates } => {
                (path.part == 0).then(|| coordinates.get(path.index).copied())?
            }
            Geometry::Polygon { coordinates } | Geometry::MultiLineString { coordinates } => {
                coordinates.get(path.part)?.get(path.index).copied()
            }
        }
    }

    /// Moves one vertex; moving the first vertex of a ring keeps it closed
    pub fn set_vertex(&mut self, path: CoordPath, at: LngLat) -> bool {
        match self {
            Geometry::Point { coordinates } => {
                *coordinates = at;
                true
            }
            Geometry::LineString { coordinates } => match coordinates.get_mut(path.index) {
                Some(vertex) if path.part == 0 => {
                    *vertex = at;
                    true
                }
                _ => false,
            },
            Geometry::Polygon { coordinates } => {
                let Some(ring) = coordinates.get_mut(path.part) else {
                    return false;
                };
                let last = ring.len().saturating_sub(1);
                if path.index >= last {
                    return false;
                }
                ring[path.index] = at;
                if path.index == 0 {
                    ring[last] = at;
                }
                true
            }
            Geometry::MultiLineString { coordinates } => {
                match coordinates
                    .get_mut(path.part)
                    .and_then(|line| line.get_mut(path.index))
                {
                    Some(vertex) => {
                        *vertex = at;
                        true
                    }
                    None => false,
                }
            }
        }
    }

    pub fn translate(&mut self, delta: LngLat) {
        match self {
            Geometry::Point { coordinates } => *coordinates = coordinates.translate(delta),
            Geometry::LineString { coordinates } => shift(coordinates, delta),
            Geometry::Polygon { coordinates } | Geometry::MultiLineString { coordinates } => {
                for part in coordinates {
                    shift(part, delta);
                }
            }
        }
    }

    /// Structural validity of a finished geometry
    ///
    /// Lines need two distinct positions, rings at least three distinct
    /// positions and a closing vertex.
    pub fn is_valid(&self) -> bool {
        match self {
            Geometry::Point { coordinates } => coordinates.is_valid(),
            Geometry::LineString { coordinates } => distinct(coordinates) >= 2,
            Geometry::Polygon { coordinates } => {
                !coordinates.is_empty()
                    && coordinates.iter().all(|ring| {
                        ring.len() >= 4 && ring.first() == ring.last() && distinct(ring) >= 3
                    })
            }
            Geometry::MultiLineString { coordinates } => {
                !coordinates.is_empty() && coordinates.iter().all(|line| distinct(line) >= 2)
            }
        }
    }

    /// Planar distance in degrees from `at` to the geometry
    ///
    /// Zero inside a polygon; infinite for a geometry without positions.
    pub fn distance_to(&self, at: LngLat) -> f64 {
        let point = geo::Point::from(geo::Coord::from(at));
        match self {
            Geometry::Point { coordinates } => {
                point.euclidean_distance(&geo::Point::from(geo::Coord::from(*coordinates)))
            }
            Geometry::LineString { coordinates } => line_distance(&point, coordinates),
            Geometry::Polygon { coordinates } => {
                let Some(exterior) = coordinates.first() else {
                    return f64::INFINITY;
                };
                if exterior.len() >= 4 {
                    let polygon = geo::Polygon::new(line_string(exterior), Vec::new());
                    if polygon.contains(&point) {
                        return 0.0;
                    }
                }
                line_distance(&point, exterior)
            }
            Geometry::MultiLineString { coordinates } => coordinates
                .iter()
                .map(|line| line_distance(&point, line))
                .fold(f64::INFINITY, f64::min),
        }
    }
}

fn indexed(part: usize, coordinates: &[LngLat]) -> Vec<(CoordPath, LngLat)> {
    coordinates
        .iter()
        .enumerate()
        .map(|(index, lng_lat)| (CoordPath::new(part, index), *lng_lat))
        .collect()
}

fn shift(coordinates: &mut [LngLat], delta: LngLat) {
    for lng_lat in coordinates {
        *lng_lat = lng_lat.translate(delta);
    }
}

fn distinct(coordinates: &[LngLat]) -> usize {
    let mut seen: Vec<LngLat> = Vec::new();
    for lng_lat in coordinates {
        if !seen.contains(lng_lat) {
            seen.push(*lng_lat);
        }
    }
    seen.len()
}

fn line_string(coordinates: &[LngLat]) -> geo::LineString<f64> {
    geo::LineString::new(coordinates.iter().map(|c| geo::Coord::from(*c)).collect())
}

fn line_distance(point: &geo::Point<f64>, coordinates: &[LngLat]) -> f64 {
    match coordinates {
        [] => f64::INFINITY,
        [single] => point.euclidean_distance(&geo::Point::from(geo::Coord::from(*single))),
        _ => point.euclidean_distance(&line_string(coordinates)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geojson_parsing() {
        let geojson_str = r#"
        {
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [-74.0060, 40.7128]},
                    "properties": {"name": "New York"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                    "properties": {}
                }
            ]
        }
        "#;
        let geojson = GeoJson::parse(geojson_str).unwrap();
        let features = geojson.features();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].properties["name"], json!("New York"));
        assert_eq!(
            features[0].geometry,
            Some(Geometry::Point {
                coordinates: LngLat::new(-74.0060, 40.7128)
            })
        );
    }

    #[test]
    fn test_geometry_serializes_as_geojson() {
        let geometry = Geometry::LineString {
            coordinates: vec![LngLat::new(0.0, 0.0), LngLat::new(1.0, 2.0)],
        };
        assert_eq!(
            serde_json::to_value(&geometry).unwrap(),
            json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 2.0]]})
        );
    }

    #[test]
    fn test_polygon_vertex_keeps_ring_closed() {
        let mut square = Geometry::Polygon {
            coordinates: vec![vec![
                LngLat::new(0.0, 0.0),
                LngLat::new(1.0, 0.0),
                LngLat::new(1.0, 1.0),
                LngLat::new(0.0, 0.0),
            ]],
        };
        assert_eq!(square.vertices().len(), 3);
        assert!(square.set_vertex(CoordPath::new(0, 0), LngLat::new(-1.0, -1.0)));
        assert!(square.is_valid());
        assert_eq!(
            square.vertex(CoordPath::new(0, 3)),
            Some(LngLat::new(-1.0, -1.0))
        );
    }

    #[test]
    fn test_validity() {
        let degenerate = Geometry::LineString {
            coordinates: vec![LngLat::new(1.0, 1.0), LngLat::new(1.0, 1.0)],
        };
        assert!(!degenerate.is_valid());
        assert!(!Geometry::empty_polygon().is_valid());
    }

    #[test]
    fn test_distance_to() {
        let square = Geometry::Polygon {
            coordinates: vec![vec![
                LngLat::new(0.0, 0.0),
                LngLat::new(2.0, 0.0),
                LngLat::new(2.0, 2.0),
                LngLat::new(0.0, 2.0),
                LngLat::new(0.0, 0.0),
            ]],
        };
        assert_eq!(square.distance_to(LngLat::new(1.0, 1.0)), 0.0);
        assert!((square.distance_to(LngLat::new(3.0, 1.0)) - 1.0).abs() < 1e-9);
        assert!(Geometry::LineString {
            coordinates: Vec::new()
        }
        .distance_to(LngLat::new(0.0, 0.0))
        .is_infinite());
    }
}
