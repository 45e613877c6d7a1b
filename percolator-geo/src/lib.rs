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

//! Geographic support for the percolator matching engine.
//!
//! Three concerns live here:
//!
//! 1. **Coordinate normalization** ([`point`]): heterogeneous point
//!    encodings (`{lat, lon}`, `lat_lon` arrays/objects/strings, geohashes)
//!    are folded into one canonical [`Coordinate`].
//! 2. **Distance** ([`distance`]): great-circle distance and parsing of
//!    human-readable distance strings ("1.5 km", "365219.816 Ft").
//! 3. **Spatial index** ([`spatial`]): per-field registry of circles and
//!    polygons answering "which registered shapes contain this point" in
//!    better-than-linear time via geohash-prefix bucketing.

pub mod distance;
pub mod point;
pub mod spatial;

pub use distance::haversine_distance;
pub use distance::parse_distance;
pub use distance::EARTH_RADIUS_METERS;
pub use point::camelize;
pub use point::geohash_key;
pub use point::normalize_geo_point;
pub use point::Coordinate;
pub use point::CANONICAL_GEOHASH_PRECISION;
pub use spatial::GeoShape;
pub use spatial::SpatialIndex;
