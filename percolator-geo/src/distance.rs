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

//! Great-circle distance and human-readable distance parsing.

use once_cell::sync::Lazy;
use percolator_error::GeoError;
use regex::Regex;
use serde_json::Value;

use crate::point::Coordinate;

/// Equatorial earth radius in meters.
///
/// The equatorial value keeps the conventional "111320 m per degree of
/// longitude at the equator" figure inside the radius it implies.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// `"<number> <unit>"` with an optional unit suffix.
static DISTANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*([a-zA-Z]*)\s*$").unwrap()
});

/// Great-circle distance between two coordinates in meters (haversine).
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.lat().to_radians();
    let lat_b = b.lat().to_radians();
    let delta_lat = (b.lat() - a.lat()).to_radians();
    let delta_lon = (b.lon() - a.lon()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

fn unit_factor(unit: &str) -> Option<f64> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "m" | "meter" | "meters" => Some(1.0),
        "km" | "kilometer" | "kilometers" => Some(1_000.0),
        "mi" | "mile" | "miles" => Some(1_609.344),
        "ft" | "foot" | "feet" => Some(0.3048),
        "yd" | "yard" | "yards" => Some(0.9144),
        "in" | "inch" | "inches" => Some(0.0254),
        _ => None,
    }
}

/// Parse a distance operand into meters.
///
/// Accepts a raw number (meters) or a unit string such as `"1.5 km"` or
/// `"365219.816 Ft"`. Negative distances are rejected.
pub fn parse_distance(value: &Value) -> Result<f64, GeoError> {
    let meters = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| GeoError::invalid_distance(n.to_string()))?,
        Value::String(text) => {
            let captures = DISTANCE_RE
                .captures(text)
                .ok_or_else(|| GeoError::invalid_distance(text.clone()))?;
            let magnitude: f64 = captures[1]
                .parse()
                .map_err(|_| GeoError::invalid_distance(text.clone()))?;
            let factor = unit_factor(&captures[2])
                .ok_or_else(|| GeoError::invalid_distance(text.clone()))?;
            magnitude * factor
        }
        other => {
            return Err(GeoError::invalid_distance(
                serde_json::to_string(other).unwrap_or_default(),
            ))
        }
    };
    if !meters.is_finite() || meters < 0.0 {
        return Err(GeoError::invalid_distance(meters.to_string()));
    }
    Ok(meters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_haversine_zero_distance() {
        let p = coord(48.8566, 2.3522);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_longitude_at_equator() {
        let origin = coord(0.0, 0.0);
        let east = coord(0.0, 1.0);
        let d = haversine_distance(&origin, &east);
        // one degree of longitude at the equator, equatorial radius
        assert!((d - 111_319.49).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = coord(40.7128, -74.0060);
        let b = coord(51.5074, -0.1278);
        let ab = haversine_distance(&a, &b);
        let ba = haversine_distance(&b, &a);
        assert!((ab - ba).abs() < 1e-6);
        // New York to London is around 5,570 km
        assert!((ab - 5_570_000.0).abs() < 30_000.0, "got {ab}");
    }

    #[test]
    fn test_parse_raw_meters() {
        assert_eq!(parse_distance(&serde_json::json!(111320)).unwrap(), 111_320.0);
        assert_eq!(parse_distance(&serde_json::json!(10.5)).unwrap(), 10.5);
    }

    #[test]
    fn test_parse_unit_strings() {
        assert_eq!(parse_distance(&serde_json::json!("500 m")).unwrap(), 500.0);
        assert_eq!(parse_distance(&serde_json::json!("1.5km")).unwrap(), 1_500.0);
        let ft = parse_distance(&serde_json::json!("365219.816 Ft")).unwrap();
        assert!((ft - 111_319.0).abs() < 1.0, "got {ft}");
        assert_eq!(parse_distance(&serde_json::json!("2 Miles")).unwrap(), 3_218.688);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_distance(&serde_json::json!("far away")).is_err());
        assert!(parse_distance(&serde_json::json!("12 parsecs")).is_err());
        assert!(parse_distance(&serde_json::json!(-5)).is_err());
        assert!(parse_distance(&serde_json::json!(["10m"])).is_err());
    }
}
