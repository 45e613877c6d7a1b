// Copyright 2025 The Percolator Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-field spatial index over circles and polygons.
//!
//! Each registered shape is bucketed under the longest geohash cell that
//! wholly contains its bounding box. A point query probes only the cells
//! along its own geohash prefix chain (at most nine lookups), then
//! exact-tests the candidates: haversine for circles, ray casting for
//! polygons. Query cost is therefore driven by spatially nearby shapes,
//! not by the total number of registered shapes.

use std::collections::HashMap;
use std::collections::HashSet;

use cheetah_string::CheetahString;

use crate::distance::haversine_distance;
use crate::distance::EARTH_RADIUS_METERS;
use crate::point::Coordinate;

/// Deepest geohash cell used for bucketing (roughly 19 m).
const MAX_CELL_PRECISION: usize = 8;

/// Meters covered by one degree of latitude.
const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

/// A registered geographic shape.
#[derive(Debug, Clone)]
pub enum GeoShape {
    Circle {
        center: Coordinate,
        radius_m: f64,
    },
    /// Closed ring of at least 3 vertices.
    Polygon {
        points: Vec<Coordinate>,
    },
}

#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    /// Set when the shape reaches a pole or the antimeridian; such shapes
    /// are bucketed at the root cell.
    unbounded: bool,
}

impl GeoShape {
    pub fn circle(center: Coordinate, radius_m: f64) -> Self {
        GeoShape::Circle { center, radius_m }
    }

    pub fn polygon(points: Vec<Coordinate>) -> Self {
        GeoShape::Polygon { points }
    }

    /// Whether the shape contains the given point.
    ///
    /// Circle membership is inclusive: a point at exactly the configured
    /// radius matches.
    pub fn contains(&self, point: &Coordinate) -> bool {
        match self {
            GeoShape::Circle { center, radius_m } => {
                haversine_distance(center, point) <= *radius_m
            }
            GeoShape::Polygon { points } => point_in_polygon(points, point),
        }
    }

    fn bounding_box(&self) -> BoundingBox {
        match self {
            GeoShape::Circle { center, radius_m } => {
                let delta_lat = radius_m / METERS_PER_DEGREE;
                let min_lat = center.lat() - delta_lat;
                let max_lat = center.lat() + delta_lat;
                let reach = center.lat().abs() + delta_lat;
                if reach >= 89.9 {
                    return BoundingBox::unbounded();
                }
                let delta_lon = delta_lat / reach.to_radians().cos();
                BoundingBox::bounded(
                    min_lat,
                    max_lat,
                    center.lon() - delta_lon,
                    center.lon() + delta_lon,
                )
            }
            GeoShape::Polygon { points } => {
                let mut min_lat = f64::INFINITY;
                let mut max_lat = f64::NEG_INFINITY;
                let mut min_lon = f64::INFINITY;
                let mut max_lon = f64::NEG_INFINITY;
                for p in points {
                    min_lat = min_lat.min(p.lat());
                    max_lat = max_lat.max(p.lat());
                    min_lon = min_lon.min(p.lon());
                    max_lon = max_lon.max(p.lon());
                }
                BoundingBox::bounded(min_lat, max_lat, min_lon, max_lon)
            }
        }
    }
}

impl BoundingBox {
    fn unbounded() -> Self {
        BoundingBox {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
            unbounded: true,
        }
    }

    fn bounded(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        let unbounded = min_lat <= -89.9
            || max_lat >= 89.9
            || min_lon <= -179.9
            || max_lon >= 179.9;
        BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            unbounded,
        }
    }

    /// Longest geohash cell wholly containing this box.
    ///
    /// Geohash cells at every depth are axis-aligned rectangles, so if both
    /// opposite corners land in the same cell the whole box does.
    fn cell(&self) -> String {
        if self.unbounded {
            return String::new();
        }
        let low = encode_clamped(self.min_lat, self.min_lon);
        let high = encode_clamped(self.max_lat, self.max_lon);
        match (low, high) {
            (Some(low), Some(high)) => common_prefix(&low, &high),
            _ => String::new(),
        }
    }
}

fn encode_clamped(lat: f64, lon: f64) -> Option<String> {
    let lat = lat.clamp(-89.999_999, 89.999_999);
    let lon = lon.clamp(-179.999_999, 179.999_999);
    geohash::encode(geohash::Coord { x: lon, y: lat }, MAX_CELL_PRECISION).ok()
}

fn common_prefix(a: &str, b: &str) -> String {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

/// Standard even-odd ray casting on the lat/lon plane.
fn point_in_polygon(points: &[Coordinate], point: &Coordinate) -> bool {
    if points.len() < 3 {
        return false;
    }
    let (x, y) = (point.lon(), point.lat());
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = (points[i].lon(), points[i].lat());
        let (xj, yj) = (points[j].lon(), points[j].lat());
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

struct ShapeEntry {
    shape: GeoShape,
    cell: String,
}

#[derive(Default)]
struct FieldShapes {
    shapes: HashMap<CheetahString, ShapeEntry>,
    cells: HashMap<String, Vec<CheetahString>>,
}

/// Index of geographic shapes, keyed by document field.
///
/// Circles and polygons share the index; entries are identified by the
/// canonical predicate id that registered them.
#[derive(Default)]
pub struct SpatialIndex {
    fields: HashMap<CheetahString, FieldShapes>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Register a shape for `field` under the given predicate id.
    ///
    /// Re-inserting an existing id replaces its shape.
    pub fn insert(&mut self, field: CheetahString, id: CheetahString, shape: GeoShape) {
        let entry = self.fields.entry(field).or_default();
        if entry.shapes.contains_key(&id) {
            Self::detach(entry, id.as_str());
        }
        let cell = shape.bounding_box().cell();
        entry
            .cells
            .entry(cell.clone())
            .or_default()
            .push(id.clone());
        entry.shapes.insert(id, ShapeEntry { shape, cell });
    }

    /// Drop the shape registered under `id`, pruning the field entry when
    /// it empties. Unknown ids are a no-op.
    pub fn remove(&mut self, field: &str, id: &str) {
        let Some(entry) = self.fields.get_mut(field) else {
            return;
        };
        Self::detach(entry, id);
        if entry.shapes.is_empty() {
            self.fields.remove(field);
        }
    }

    fn detach(entry: &mut FieldShapes, id: &str) {
        let Some(removed) = entry.shapes.remove(id) else {
            return;
        };
        if let Some(ids) = entry.cells.get_mut(&removed.cell) {
            ids.retain(|existing| existing.as_str() != id);
            if ids.is_empty() {
                entry.cells.remove(&removed.cell);
            }
        }
    }

    /// Sorted ids of every shape on `field` containing the point.
    pub fn query_point(&self, field: &str, point: &Coordinate) -> Vec<CheetahString> {
        let Some(entry) = self.fields.get(field) else {
            return Vec::new();
        };
        let Some(hash) = encode_clamped(point.lat(), point.lon()) else {
            return Vec::new();
        };

        let mut seen: HashSet<&CheetahString> = HashSet::new();
        let mut matched = Vec::new();
        for len in 0..=MAX_CELL_PRECISION {
            let Some(ids) = entry.cells.get(&hash[..len]) else {
                continue;
            };
            for id in ids {
                if !seen.insert(id) {
                    continue;
                }
                if let Some(shape_entry) = entry.shapes.get(id) {
                    if shape_entry.shape.contains(point) {
                        matched.push(id.clone());
                    }
                }
            }
        }
        matched.sort_unstable();
        matched
    }

    /// Sorted ids of every shape registered on `field`.
    pub fn ids(&self, field: &str) -> Vec<CheetahString> {
        let mut ids: Vec<CheetahString> = self
            .fields
            .get(field)
            .map(|entry| entry.shapes.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn square(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> GeoShape {
        GeoShape::polygon(vec![
            coord(min_lat, min_lon),
            coord(min_lat, max_lon),
            coord(max_lat, max_lon),
            coord(max_lat, min_lon),
        ])
    }

    #[test]
    fn test_circle_boundary_is_inclusive() {
        let center = coord(0.0, 0.0);
        let on_boundary = coord(0.0, 1.0);
        let exact = haversine_distance(&center, &on_boundary);

        let circle = GeoShape::circle(center, exact);
        assert!(circle.contains(&on_boundary));

        let tighter = GeoShape::circle(center, exact - 1.0);
        assert!(!tighter.contains(&on_boundary));
    }

    #[test]
    fn test_polygon_ray_casting() {
        let shape = square(-1.0, -1.0, 1.0, 1.0);
        assert!(shape.contains(&coord(0.0, 0.0)));
        assert!(shape.contains(&coord(0.99, -0.99)));
        assert!(!shape.contains(&coord(1.5, 0.0)));
        assert!(!shape.contains(&coord(0.0, -1.5)));
    }

    #[test]
    fn test_concave_polygon() {
        // L-shaped: the notch around (2, 2) is outside
        let shape = GeoShape::polygon(vec![
            coord(0.0, 0.0),
            coord(0.0, 3.0),
            coord(1.0, 3.0),
            coord(1.0, 1.0),
            coord(3.0, 1.0),
            coord(3.0, 0.0),
        ]);
        assert!(shape.contains(&coord(0.5, 0.5)));
        assert!(shape.contains(&coord(2.0, 0.5)));
        assert!(!shape.contains(&coord(2.0, 2.0)));
    }

    #[test]
    fn test_query_point_returns_sorted_containing_ids() {
        let mut index = SpatialIndex::new();
        let center = coord(48.8566, 2.3522);
        index.insert(
            "location".into(),
            "b-paris".into(),
            GeoShape::circle(center, 10_000.0),
        );
        index.insert(
            "location".into(),
            "a-france".into(),
            square(42.0, -5.0, 51.0, 8.0),
        );
        index.insert(
            "location".into(),
            "c-tokyo".into(),
            GeoShape::circle(coord(35.68, 139.76), 10_000.0),
        );

        let hits = index.query_point("location", &coord(48.85, 2.35));
        assert_eq!(hits, vec![CheetahString::from("a-france"), CheetahString::from("b-paris")]);

        let hits = index.query_point("location", &coord(35.68, 139.76));
        assert_eq!(hits, vec![CheetahString::from("c-tokyo")]);
    }

    #[test]
    fn test_fields_are_isolated() {
        let mut index = SpatialIndex::new();
        index.insert(
            "home".into(),
            "p1".into(),
            GeoShape::circle(coord(0.0, 0.0), 1_000.0),
        );
        assert!(index.query_point("work", &coord(0.0, 0.0)).is_empty());
        assert!(index.has_field("home"));
        assert!(!index.has_field("work"));
    }

    #[test]
    fn test_remove_prunes_empty_field() {
        let mut index = SpatialIndex::new();
        index.insert(
            "location".into(),
            "p1".into(),
            GeoShape::circle(coord(0.0, 0.0), 1_000.0),
        );
        index.insert(
            "location".into(),
            "p2".into(),
            GeoShape::circle(coord(0.0, 0.0), 2_000.0),
        );

        index.remove("location", "p1");
        assert!(index.has_field("location"));
        assert_eq!(index.ids("location"), vec![CheetahString::from("p2")]);

        index.remove("location", "p2");
        assert!(!index.has_field("location"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_large_shape_buckets_at_root() {
        let mut index = SpatialIndex::new();
        // spans the antimeridian reach, lands in the root cell
        index.insert(
            "location".into(),
            "wide".into(),
            square(-60.0, -179.95, 60.0, 179.95),
        );
        let hits = index.query_point("location", &coord(10.0, 10.0));
        assert_eq!(hits, vec![CheetahString::from("wide")]);
    }
}
