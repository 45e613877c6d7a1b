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

//! Canonical predicate representation and evaluation.
//!
//! Predicates are a tagged enum with explicit dispatch rather than captured
//! closures, so the filter tree owns plain data it can clone, inspect, and
//! hand to the spatial index.
//!
//! Evaluation is deterministic and non-panicking: a missing field or a
//! type-mismatched value makes the base condition false, and the `negate`
//! flag complements the result (an absent field vacuously satisfies any
//! negated condition).

use percolator_geo::Coordinate;
use percolator_geo::GeoShape;
use regex::Regex;
use serde_json::Value;

use crate::document::FlatDocument;
use crate::FieldName;

/// A compiled, canonical filter clause.
#[derive(Debug, Clone)]
pub enum Predicate {
    Equals {
        field: FieldName,
        value: Value,
        negate: bool,
    },
    Exists {
        field: FieldName,
        negate: bool,
    },
    Range {
        field: FieldName,
        gt: Option<f64>,
        gte: Option<f64>,
        lt: Option<f64>,
        lte: Option<f64>,
        negate: bool,
    },
    Regexp {
        field: FieldName,
        pattern: Regex,
        negate: bool,
    },
    GeoDistance {
        field: FieldName,
        center: Coordinate,
        radius_m: f64,
        negate: bool,
    },
    GeoPolygon {
        field: FieldName,
        points: Vec<Coordinate>,
        negate: bool,
    },
}

impl Predicate {
    pub fn field(&self) -> &FieldName {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::Exists { field, .. }
            | Predicate::Range { field, .. }
            | Predicate::Regexp { field, .. }
            | Predicate::GeoDistance { field, .. }
            | Predicate::GeoPolygon { field, .. } => field,
        }
    }

    pub fn negate(&self) -> bool {
        match self {
            Predicate::Equals { negate, .. }
            | Predicate::Exists { negate, .. }
            | Predicate::Range { negate, .. }
            | Predicate::Regexp { negate, .. }
            | Predicate::GeoDistance { negate, .. }
            | Predicate::GeoPolygon { negate, .. } => *negate,
        }
    }

    pub fn is_geo(&self) -> bool {
        matches!(
            self,
            Predicate::GeoDistance { .. } | Predicate::GeoPolygon { .. }
        )
    }

    /// The shape a geo predicate registers into the spatial index.
    pub fn shape(&self) -> Option<GeoShape> {
        match self {
            Predicate::GeoDistance {
                center, radius_m, ..
            } => Some(GeoShape::circle(*center, *radius_m)),
            Predicate::GeoPolygon { points, .. } => Some(GeoShape::polygon(points.clone())),
            _ => None,
        }
    }

    /// Evaluate against a flattened document.
    ///
    /// Geo predicates evaluate directly against the document here; during a
    /// matching pass the matcher resolves them through the spatial index
    /// instead, which is equivalent but sub-linear across many shapes.
    pub fn evaluate(&self, doc: &FlatDocument) -> bool {
        let Some(value) = doc.get(self.field()) else {
            return self.negate();
        };
        self.test(value) ^ self.negate()
    }

    /// Base condition against a present field value, before negation.
    pub(crate) fn test(&self, value: &Value) -> bool {
        match self {
            Predicate::Equals { value: expected, .. } => value_equals(value, expected),
            Predicate::Exists { .. } => true,
            Predicate::Range {
                gt, gte, lt, lte, ..
            } => {
                let Some(n) = value.as_f64() else {
                    return false;
                };
                gt.is_none_or(|bound| n > bound)
                    && gte.is_none_or(|bound| n >= bound)
                    && lt.is_none_or(|bound| n < bound)
                    && lte.is_none_or(|bound| n <= bound)
            }
            Predicate::Regexp { pattern, .. } => {
                value.as_str().is_some_and(|text| pattern.is_match(text))
            }
            Predicate::GeoDistance { .. } | Predicate::GeoPolygon { .. } => {
                let Ok(point) = percolator_geo::normalize_geo_point(value) else {
                    return false;
                };
                self.shape().is_some_and(|shape| shape.contains(&point))
            }
        }
    }
}

/// Equality with numeric coercion: `1` and `1.0` are the same number.
fn value_equals(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(content: Value) -> FlatDocument {
        FlatDocument::flatten(&content)
    }

    fn equals(field: &str, value: Value) -> Predicate {
        Predicate::Equals {
            field: field.into(),
            value,
            negate: false,
        }
    }

    #[test]
    fn test_equals() {
        let p = equals("city", json!("NYC"));
        assert!(p.evaluate(&doc(json!({"city": "NYC"}))));
        assert!(!p.evaluate(&doc(json!({"city": "London"}))));
        assert!(!p.evaluate(&doc(json!({"name": "Ada"}))));
    }

    #[test]
    fn test_equals_numeric_coercion() {
        let p = equals("age", json!(30));
        assert!(p.evaluate(&doc(json!({"age": 30.0}))));
        assert!(!p.evaluate(&doc(json!({"age": "30"}))));
    }

    #[test]
    fn test_negated_equals_vacuous_on_missing_field() {
        let p = Predicate::Equals {
            field: "city".into(),
            value: json!("NYC"),
            negate: true,
        };
        assert!(!p.evaluate(&doc(json!({"city": "NYC"}))));
        assert!(p.evaluate(&doc(json!({"city": "London"}))));
        assert!(p.evaluate(&doc(json!({"name": "Ada"}))));
    }

    #[test]
    fn test_exists_and_missing() {
        let exists = Predicate::Exists {
            field: "city".into(),
            negate: false,
        };
        let missing = Predicate::Exists {
            field: "city".into(),
            negate: true,
        };
        let with = doc(json!({"city": null}));
        let without = doc(json!({"name": "Ada"}));
        assert!(exists.evaluate(&with));
        assert!(!exists.evaluate(&without));
        assert!(!missing.evaluate(&with));
        assert!(missing.evaluate(&without));
    }

    #[test]
    fn test_range_bounds() {
        let p = Predicate::Range {
            field: "age".into(),
            gt: None,
            gte: Some(21.0),
            lt: Some(65.0),
            lte: None,
            negate: false,
        };
        assert!(p.evaluate(&doc(json!({"age": 21}))));
        assert!(p.evaluate(&doc(json!({"age": 40.5}))));
        assert!(!p.evaluate(&doc(json!({"age": 65}))));
        assert!(!p.evaluate(&doc(json!({"age": "forty"}))));
    }

    #[test]
    fn test_regexp() {
        let p = Predicate::Regexp {
            field: "name".into(),
            pattern: Regex::new("(?i)^ada").unwrap(),
            negate: false,
        };
        assert!(p.evaluate(&doc(json!({"name": "Ada Lovelace"}))));
        assert!(p.evaluate(&doc(json!({"name": "ADA"}))));
        assert!(!p.evaluate(&doc(json!({"name": "Grace"}))));
        assert!(!p.evaluate(&doc(json!({"name": 7}))));
    }

    #[test]
    fn test_geo_distance_direct_evaluation() {
        let p = Predicate::GeoDistance {
            field: "location".into(),
            center: Coordinate::new(0.0, 0.0).unwrap(),
            radius_m: 111_320.0,
            negate: false,
        };
        assert!(p.evaluate(&doc(json!({"location": {"lat": 0.0, "lon": 1.0}}))));
        assert!(!p.evaluate(&doc(json!({"location": {"lat": 0.0, "lon": 1.1}}))));
        // unparsable point fails the base condition
        assert!(!p.evaluate(&doc(json!({"location": "nowhere in particular"}))));
    }
}
