use geo::{HaversineBearing, HaversineDestination, HaversineDistance};
use serde::{Deserialize, Serialize};

/// Geographic position, serialized as a GeoJSON `[lng, lat]` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    /// Creates a new LngLat coordinate
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Shifts the position by a lng/lat delta
    pub fn translate(&self, delta: LngLat) -> LngLat {
        LngLat::new(self.lng + delta.lng, self.lat + delta.lat)
    }

    /// Component-wise difference `self - other`
    pub fn delta_from(&self, other: &LngLat) -> LngLat {
        LngLat::new(self.lng - other.lng, self.lat - other.lat)
    }

    /// Equality within `tolerance` degrees on both axes
    pub fn approx_eq(&self, other: &LngLat, tolerance: f64) -> bool {
        (self.lng - other.lng).abs() <= tolerance && (self.lat - other.lat).abs() <= tolerance
    }

    fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }

    fn from_point(point: geo::Point<f64>) -> Self {
        Self::new(point.x(), point.y())
    }
}

impl Default for LngLat {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(lng_lat: LngLat) -> Self {
        [lng_lat.lng, lng_lat.lat]
    }
}

impl From<LngLat> for geo::Coord<f64> {
    fn from(lng_lat: LngLat) -> Self {
        geo::Coord {
            x: lng_lat.lng,
            y: lng_lat.lat,
        }
    }
}

/// Represents a point in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Haversine distance in kilometers
pub fn distance_km(from: LngLat, to: LngLat) -> f64 {
    from.to_point().haversine_distance(&to.to_point()) / 1000.0
}

/// Initial bearing from `from` to `to`, degrees clockwise from north
pub fn bearing(from: LngLat, to: LngLat) -> f64 {
    from.to_point().haversine_bearing(to.to_point())
}

/// Point reached travelling `distance_km` from `origin` along `bearing_deg`
pub fn destination(origin: LngLat, distance_km: f64, bearing_deg: f64) -> LngLat {
    LngLat::from_point(
        origin
            .to_point()
            .haversine_destination(bearing_deg, distance_km * 1000.0),
    )
}

/// Closed polygon ring approximating a circle of `radius_km` around `center`
///
/// Ring vertices are laid out counter-clockwise starting due north, with the
/// first vertex repeated at the end.
pub fn circle_ring(center: LngLat, radius_km: f64, steps: usize) -> Vec<LngLat> {
    let steps = steps.max(4);
    let mut ring: Vec<LngLat> = (0..steps)
        .map(|i| destination(center, radius_km, i as f64 * -360.0 / steps as f64))
        .collect();
    ring.push(ring[0]);
    ring
}

/// Closed axis-aligned ring enclosing two opposite corners
///
/// Order is `[min,min] [max,min] [max,max] [min,max] [min,min]`.
pub fn envelope_ring(a: LngLat, b: LngLat) -> Vec<LngLat> {
    let rect = geo::Rect::new(geo::Coord::from(a), geo::Coord::from(b));
    let (min, max) = (rect.min(), rect.max());
    vec![
        LngLat::new(min.x, min.y),
        LngLat::new(max.x, min.y),
        LngLat::new(max.x, max.y),
        LngLat::new(min.x, max.y),
        LngLat::new(min.x, min.y),
    ]
}

/// Shaft plus chevron for an arrow pointing from `start` to `end`
///
/// The chevron arms leave `end` at `bearing(end, start) ± spread_deg` and are
/// `head_km` long.
pub fn arrow_lines(start: LngLat, end: LngLat, head_km: f64, spread_deg: f64) -> Vec<Vec<LngLat>> {
    let back = bearing(end, start);
    let left = destination(end, head_km, back + spread_deg);
    let right = destination(end, head_km, back - spread_deg);
    vec![vec![start, end], vec![left, end, right]]
}

/// Resamples a polyline so consecutive points are at most `step_km` apart
///
/// Every original vertex is kept once; intermediate points are generated
/// along the bearing of each segment.
pub fn densify(coords: &[LngLat], step_km: f64) -> Vec<LngLat> {
    let mut out = Vec::new();
    if step_km <= 0.0 {
        return coords.to_vec();
    }
    for pair in coords.windows(2) {
        let (mut cursor, end) = (pair[0], pair[1]);
        let heading = bearing(cursor, end);
        let mut remaining = distance_km(cursor, end);
        if out.last() != Some(&cursor) {
            out.push(cursor);
        }
        while remaining >= step_km {
            remaining -= step_km;
            cursor = destination(cursor, step_km, heading);
            out.push(cursor);
        }
        out.push(end);
    }
    if out.is_empty() {
        out.extend_from_slice(coords);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lng_lat_creation() {
        let coord = LngLat::new(-74.0060, 40.7128);
        assert_eq!(coord.lat, 40.7128);
        assert_eq!(coord.lng, -74.0060);
        assert!(coord.is_valid());
    }

    #[test]
    fn test_lng_lat_distance() {
        let nyc = LngLat::new(-74.0060, 40.7128);
        let la = LngLat::new(-118.2437, 34.0522);
        let distance = distance_km(nyc, la);

        // Distance should be approximately 3936 km
        assert!((distance - 3936.0).abs() < 15.0);
    }

    #[test]
    fn test_lng_lat_serializes_as_pair() {
        let value = serde_json::to_value(LngLat::new(1.5, 2.5)).unwrap();
        assert_eq!(value, serde_json::json!([1.5, 2.5]));
        let back: LngLat = serde_json::from_value(value).unwrap();
        assert_eq!(back, LngLat::new(1.5, 2.5));
    }

    #[test]
    fn test_circle_ring_is_closed_and_round() {
        let center = LngLat::new(116.4, 39.9);
        let ring = circle_ring(center, 2.0, 64);
        assert_eq!(ring.len(), 65);
        assert_eq!(ring.first(), ring.last());
        for vertex in &ring {
            assert!((distance_km(center, *vertex) - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_envelope_ring_normalizes_corners() {
        let ring = envelope_ring(LngLat::new(3.0, 4.0), LngLat::new(1.0, 2.0));
        assert_eq!(ring[0], LngLat::new(1.0, 2.0));
        assert_eq!(ring[2], LngLat::new(3.0, 4.0));
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_arrow_lines_shape() {
        let lines = arrow_lines(LngLat::new(0.0, 0.0), LngLat::new(0.1, 0.0), 0.0321869, 30.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1][1], LngLat::new(0.1, 0.0));
        // Both arms sit behind the tip
        assert!(lines[1][0].lng < 0.1);
        assert!(lines[1][2].lng < 0.1);
    }

    #[test]
    fn test_densify_keeps_endpoints() {
        let coords = [LngLat::new(0.0, 0.0), LngLat::new(0.01, 0.0)];
        let dense = densify(&coords, 0.1);
        assert_eq!(dense.first(), Some(&coords[0]));
        assert_eq!(dense.last(), Some(&coords[1]));
        assert!(dense.len() > 10);
    }

    #[test]
    fn test_densify_emits_shared_vertices_once() {
        let coords = [
            LngLat::new(0.0, 0.0),
            LngLat::new(0.001, 0.0),
            LngLat::new(0.001, 0.001),
            LngLat::new(0.002, 0.001),
        ];
        let dense = densify(&coords, 0.05);
        assert!(dense.windows(2).all(|pair| pair[0] != pair[1]));
        for vertex in &coords {
            assert_eq!(dense.iter().filter(|point| *point == vertex).count(), 1);
        }
    }
}
