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

/// Error types for coordinate normalization and distance parsing
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Unrecognized geo point format: {0}")]
    InvalidFormat(String),

    #[error("Latitude {0} is out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} is out of range [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("Invalid geohash '{0}'")]
    InvalidGeohash(String),

    #[error("Cannot parse distance value '{0}'")]
    InvalidDistance(String),
}

impl GeoError {
    pub fn invalid_format(detail: impl Into<String>) -> Self {
        GeoError::InvalidFormat(detail.into())
    }

    pub fn invalid_geohash(hash: impl Into<String>) -> Self {
        GeoError::InvalidGeohash(hash.into())
    }

    pub fn invalid_distance(value: impl Into<String>) -> Self {
        GeoError::InvalidDistance(value.into())
    }
}
