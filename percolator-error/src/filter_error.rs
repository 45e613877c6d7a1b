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

use crate::geo_error::GeoError;

/// Error types for filter compilation and registration.
///
/// Every malformed filter is rejected at registration time with one of
/// these variants; each carries a distinct, stable message.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Subscription collection must not be empty")]
    EmptyCollection,

    #[error("Filter body must not be empty!")]
    EmptyFilter,

    #[error("Unknown filter operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{0}' expects an object body")]
    BodyNotObject(&'static str),

    #[error("Operator '{0}' expects exactly one field entry")]
    MissingField(&'static str),

    #[error("geoDistance filter is missing a location point")]
    MissingLocation,

    #[error("geoDistance filter is missing a distance")]
    MissingDistance,

    #[error("Cannot parse distance value '{0}'")]
    InvalidDistance(String),

    #[error("Malformed coordinate: {0}")]
    MalformedCoordinate(String),

    #[error("geoPolygon 'points' must be an array")]
    PointsNotArray,

    #[error("geoPolygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    #[error("geoBoundingBox filter is missing '{0}'")]
    MissingCorner(&'static str),

    #[error("Combinator '{0}' expects a non-empty array of filters")]
    EmptyCombinator(&'static str),

    #[error("Range filter needs at least one of gt, gte, lt, lte")]
    RangeWithoutBounds,

    #[error("Range bound '{0}' must be a number")]
    InvalidRangeBound(&'static str),

    #[error("Invalid regexp pattern '{0}'")]
    InvalidRegexp(String),
}

impl FilterError {
    pub fn unknown_operator(name: impl Into<String>) -> Self {
        FilterError::UnknownOperator(name.into())
    }

    pub fn body_not_object(operator: &'static str) -> Self {
        FilterError::BodyNotObject(operator)
    }

    pub fn missing_field(operator: &'static str) -> Self {
        FilterError::MissingField(operator)
    }

    pub fn invalid_distance(value: impl Into<String>) -> Self {
        FilterError::InvalidDistance(value.into())
    }

    pub fn too_few_points(got: usize) -> Self {
        FilterError::TooFewPoints(got)
    }

    pub fn empty_combinator(operator: &'static str) -> Self {
        FilterError::EmptyCombinator(operator)
    }

    pub fn invalid_range_bound(bound: &'static str) -> Self {
        FilterError::InvalidRangeBound(bound)
    }

    pub fn invalid_regexp(pattern: impl Into<String>) -> Self {
        FilterError::InvalidRegexp(pattern.into())
    }
}

impl From<GeoError> for FilterError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::InvalidDistance(value) => FilterError::InvalidDistance(value),
            other => FilterError::MalformedCoordinate(other.to_string()),
        }
    }
}
