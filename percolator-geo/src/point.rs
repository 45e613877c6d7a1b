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

//! Canonical coordinates and the normalizer that produces them.

use once_cell::sync::Lazy;
use percolator_error::GeoError;
use regex::Regex;
use serde_json::Value;

/// Geohash precision used for cache-key compaction.
///
/// Two filters whose geo operands differ only by floating-point noise below
/// this precision (roughly 19 m cells) share one canonical predicate.
pub const CANONICAL_GEOHASH_PRECISION: usize = 8;

/// `"lat, lon"` string form, e.g. `"40.7128, -74.0060"`.
static LAT_LON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-.0-9]+,\s*[-.0-9]+$").unwrap());

/// Bare geohash string form, e.g. `"dr5regw3"`.
static GEOHASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-z]{4,}$").unwrap());

/// A normalized geographic coordinate.
///
/// Immutable once constructed; latitude is guaranteed to be in [-90, 90]
/// and longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::LongitudeOutOfRange(lon));
        }
        Ok(Coordinate { lat, lon })
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Translate a snake_case key to its camelCase form.
///
/// `lat_lon` becomes `latLon`, `top_left` becomes `topLeft`; keys without
/// underscores pass through unchanged.
pub fn camelize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn from_lat_lon_object(map: &serde_json::Map<String, Value>) -> Option<Result<Coordinate, GeoError>> {
    let lat = map.get("lat").and_then(number)?;
    let lon = map.get("lon").and_then(number)?;
    Some(Coordinate::new(lat, lon))
}

fn from_string(text: &str) -> Result<Coordinate, GeoError> {
    if LAT_LON_RE.is_match(text) {
        let mut parts = text.splitn(2, ',');
        let lat = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(|| GeoError::invalid_format(text))?;
        let lon = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(|| GeoError::invalid_format(text))?;
        return Coordinate::new(lat, lon);
    }
    if GEOHASH_RE.is_match(text) {
        let (coord, _, _) =
            geohash::decode(text).map_err(|_| GeoError::invalid_geohash(text))?;
        return Coordinate::new(coord.y, coord.x);
    }
    Err(GeoError::invalid_format(text))
}

/// Normalize a heterogeneous geo point encoding into a [`Coordinate`].
///
/// Accepted shapes (snake_case keys are translated to camelCase first):
/// - `{lat: <num>, lon: <num>}`
/// - `{latLon: [<lon>, <lat>]}`
/// - `{latLon: {lat: <num>, lon: <num>}}`
/// - `{latLon: "<lat>, <lon>"}`
/// - `{latLon: "<geohash>"}`
pub fn normalize_geo_point(input: &Value) -> Result<Coordinate, GeoError> {
    let map = match input {
        Value::Object(map) => map,
        other => return Err(GeoError::invalid_format(compact(other))),
    };

    let mut camel = serde_json::Map::with_capacity(map.len());
    for (key, value) in map {
        camel.insert(camelize(key), value.clone());
    }

    if let Some(result) = from_lat_lon_object(&camel) {
        return result;
    }

    match camel.get("latLon") {
        Some(Value::Array(items)) if items.len() == 2 => {
            // GeoJSON-style ordering: [lon, lat]
            let lon = number(&items[0]).ok_or_else(|| GeoError::invalid_format(compact(input)))?;
            let lat = number(&items[1]).ok_or_else(|| GeoError::invalid_format(compact(input)))?;
            Coordinate::new(lat, lon)
        }
        Some(Value::Object(inner)) => {
            from_lat_lon_object(inner).unwrap_or_else(|| Err(GeoError::invalid_format(compact(input))))
        }
        Some(Value::String(text)) => from_string(text),
        _ => Err(GeoError::invalid_format(compact(input))),
    }
}

/// Encode a coordinate as a geohash string of the given precision.
///
/// Used purely to build compact, deduplicating cache keys for near-identical
/// filters, never for spatial lookup correctness.
pub fn geohash_key(coordinate: &Coordinate, precision: usize) -> Result<String, GeoError> {
    geohash::encode(
        geohash::Coord {
            x: coordinate.lon(),
            y: coordinate.lat(),
        },
        precision,
    )
    .map_err(|_| GeoError::invalid_format(format!("{},{}", coordinate.lat(), coordinate.lon())))
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unserializable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("lat_lon"), "latLon");
        assert_eq!(camelize("top_left"), "topLeft");
        assert_eq!(camelize("bottom_right"), "bottomRight");
        assert_eq!(camelize("latLon"), "latLon");
        assert_eq!(camelize("plain"), "plain");
    }

    #[test]
    fn test_plain_lat_lon_object() {
        let point = normalize_geo_point(&json!({"lat": 40.7128, "lon": -74.0060})).unwrap();
        assert_eq!(point.lat(), 40.7128);
        assert_eq!(point.lon(), -74.0060);
    }

    #[test]
    fn test_lat_lon_array_is_lon_first() {
        let point = normalize_geo_point(&json!({"lat_lon": [-74.0060, 40.7128]})).unwrap();
        assert_eq!(point.lat(), 40.7128);
        assert_eq!(point.lon(), -74.0060);
    }

    #[test]
    fn test_lat_lon_nested_object() {
        let point = normalize_geo_point(&json!({"latLon": {"lat": 51.5, "lon": -0.12}})).unwrap();
        assert_eq!(point.lat(), 51.5);
        assert_eq!(point.lon(), -0.12);
    }

    #[test]
    fn test_lat_lon_comma_string() {
        let point = normalize_geo_point(&json!({"lat_lon": "51.5, -0.12"})).unwrap();
        assert_eq!(point.lat(), 51.5);
        assert_eq!(point.lon(), -0.12);
    }

    #[test]
    fn test_lat_lon_geohash_string() {
        let point = normalize_geo_point(&json!({"lat_lon": "ezs42"})).unwrap();
        // ezs42 decodes to roughly 42.605, -5.603
        assert!((point.lat() - 42.605).abs() < 0.05);
        assert!((point.lon() + 5.603).abs() < 0.05);
    }

    #[test]
    fn test_unrecognized_shapes_error() {
        assert!(normalize_geo_point(&json!("just a string")).is_err());
        assert!(normalize_geo_point(&json!({"x": 1.0, "y": 2.0})).is_err());
        assert!(normalize_geo_point(&json!({"lat_lon": [1.0]})).is_err());
        assert!(normalize_geo_point(&json!({"lat_lon": "not/a/point"})).is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            normalize_geo_point(&json!({"lat": 91.0, "lon": 0.0})),
            Err(GeoError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            normalize_geo_point(&json!({"lat": 0.0, "lon": 181.0})),
            Err(GeoError::LongitudeOutOfRange(181.0))
        );
    }

    #[test]
    fn test_geohash_key_round_trip() {
        let point = Coordinate::new(40.7128, -74.0060).unwrap();
        let key = geohash_key(&point, CANONICAL_GEOHASH_PRECISION).unwrap();
        assert_eq!(key.len(), CANONICAL_GEOHASH_PRECISION);

        // noise below the canonical precision produces the same key
        let noisy = Coordinate::new(40.712_800_004, -74.006_000_002).unwrap();
        assert_eq!(geohash_key(&noisy, CANONICAL_GEOHASH_PRECISION).unwrap(), key);
    }
}
