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

//! Filter compiler: JSON filter DSL → canonical predicates + boolean tree.
//!
//! A filter is an object whose keys are operator names:
//!
//! ```json
//! {"and": [
//!     {"equals": {"city": "NYC"}},
//!     {"geoDistance": {"location": {"lat": 0, "lon": 1}, "distance": "500 m"}}
//! ]}
//! ```
//!
//! Each leaf clause compiles to a [`Predicate`] plus a canonical id hashed
//! from `collection + field + operator + normalized operands + negation`.
//! Two clauses that are semantically identical resolve to the same id, so
//! the filter tree stores one shared node however many subscriptions use
//! the clause. Geo operands are geohash-encoded at fixed precision and
//! distances rounded to centimeters before hashing, deliberately folding
//! floating-point noise into one predicate.
//!
//! `not` never reaches the tree as a combinator: it flips the leaf negate
//! flag and distributes over `and`/`or` by De Morgan, so only leaves carry
//! negation.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::Hash;
use std::hash::Hasher;

use cheetah_string::CheetahString;
use percolator_error::FilterError;
use percolator_geo::camelize;
use percolator_geo::geohash_key;
use percolator_geo::normalize_geo_point;
use percolator_geo::parse_distance;
use percolator_geo::Coordinate;
use percolator_geo::CANONICAL_GEOHASH_PRECISION;
use regex::Regex;
use serde_json::Value;

use crate::predicate::Predicate;
use crate::FieldName;
use crate::PredicateId;

/// The and/or recombination structure of one subscription.
///
/// Combinators wrap compiled predicates; they never create leaf nodes of
/// their own in the filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanExpr {
    Predicate(PredicateId),
    And(Vec<BooleanExpr>),
    Or(Vec<BooleanExpr>),
}

/// One canonical leaf produced by compilation.
#[derive(Debug, Clone)]
pub struct CompiledLeaf {
    pub id: PredicateId,
    pub field: FieldName,
    pub predicate: Predicate,
}

/// A fully compiled filter, ready for registration.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub ast: BooleanExpr,
    /// Distinct leaves; a clause appearing twice in the filter is listed once.
    pub leaves: Vec<CompiledLeaf>,
}

/// Compile a filter expression for the given collection.
pub fn compile(collection: &str, filter: &Value) -> Result<CompiledFilter, FilterError> {
    let mut compiler = Compiler {
        collection,
        leaves: Vec::new(),
        seen: HashSet::new(),
    };
    let ast = compiler.compile_object(filter, false)?;
    Ok(CompiledFilter {
        ast,
        leaves: compiler.leaves,
    })
}

struct Compiler<'a> {
    collection: &'a str,
    leaves: Vec<CompiledLeaf>,
    seen: HashSet<PredicateId>,
}

impl Compiler<'_> {
    /// Compile a filter object. Multiple operator keys combine as an
    /// implicit `and` (so under negation they combine as `or`).
    fn compile_object(&mut self, filter: &Value, negate: bool) -> Result<BooleanExpr, FilterError> {
        let Value::Object(map) = filter else {
            return Err(FilterError::EmptyFilter);
        };
        if map.is_empty() {
            return Err(FilterError::EmptyFilter);
        }
        let mut children = Vec::with_capacity(map.len());
        for (operator, body) in map {
            children.push(self.compile_operator(operator, body, negate)?);
        }
        Ok(combine(children, negate))
    }

    fn compile_operator(
        &mut self,
        operator: &str,
        body: &Value,
        negate: bool,
    ) -> Result<BooleanExpr, FilterError> {
        match operator {
            "and" => self.compile_combinator("and", body, negate, !negate),
            "or" => self.compile_combinator("or", body, negate, negate),
            "not" => {
                if !body.is_object() {
                    return Err(FilterError::body_not_object("not"));
                }
                self.compile_object(body, !negate)
            }
            "equals" => self.compile_equals(body, negate),
            "exists" => self.compile_exists(body, negate),
            "missing" => self.compile_exists(body, !negate),
            "range" => self.compile_range(body, negate),
            "regexp" => self.compile_regexp(body, negate),
            "geoDistance" => self.compile_geo_distance(body, negate),
            "geoPolygon" => self.compile_geo_polygon(body, negate),
            "geoBoundingBox" => self.compile_geo_bounding_box(body, negate),
            other => Err(FilterError::unknown_operator(other)),
        }
    }

    /// `and`/`or` arrays; `as_and` tells whether the (possibly De
    /// Morgan-flipped) result conjoins its children.
    fn compile_combinator(
        &mut self,
        name: &'static str,
        body: &Value,
        negate: bool,
        as_and: bool,
    ) -> Result<BooleanExpr, FilterError> {
        let Value::Array(items) = body else {
            return Err(FilterError::empty_combinator(name));
        };
        if items.is_empty() {
            return Err(FilterError::empty_combinator(name));
        }
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            children.push(self.compile_object(item, negate)?);
        }
        Ok(combine(children, !as_and))
    }

    fn compile_equals(&mut self, body: &Value, negate: bool) -> Result<BooleanExpr, FilterError> {
        let (field, value) = single_entry("equals", body)?;
        let id = self.leaf(
            &field,
            "equals",
            &canonical_value(value),
            negate,
            Predicate::Equals {
                field: field.clone(),
                value: value.clone(),
                negate,
            },
        );
        Ok(BooleanExpr::Predicate(id))
    }

    fn compile_exists(&mut self, body: &Value, negate: bool) -> Result<BooleanExpr, FilterError> {
        let field: FieldName = match body {
            Value::String(name) => name.as_str().into(),
            Value::Object(map) => match map.get("field").and_then(Value::as_str) {
                Some(name) => name.into(),
                None => return Err(FilterError::missing_field("exists")),
            },
            _ => return Err(FilterError::body_not_object("exists")),
        };
        let id = self.leaf(
            &field,
            "exists",
            "",
            negate,
            Predicate::Exists {
                field: field.clone(),
                negate,
            },
        );
        Ok(BooleanExpr::Predicate(id))
    }

    fn compile_range(&mut self, body: &Value, negate: bool) -> Result<BooleanExpr, FilterError> {
        let (field, bounds) = single_entry("range", body)?;
        let Value::Object(map) = bounds else {
            return Err(FilterError::body_not_object("range"));
        };
        let mut parsed = [None; 4];
        for (slot, name) in ["gt", "gte", "lt", "lte"].into_iter().enumerate() {
            if let Some(bound) = map.get(name) {
                parsed[slot] =
                    Some(bound.as_f64().ok_or(FilterError::invalid_range_bound(name))?);
            }
        }
        let [gt, gte, lt, lte] = parsed;
        if gt.is_none() && gte.is_none() && lt.is_none() && lte.is_none() {
            return Err(FilterError::RangeWithoutBounds);
        }
        let mut repr = String::new();
        for (bound, name) in [(gt, "gt"), (gte, "gte"), (lt, "lt"), (lte, "lte")] {
            if let Some(b) = bound {
                repr.push_str(&format!("{name}={b};"));
            }
        }
        let id = self.leaf(
            &field,
            "range",
            &repr,
            negate,
            Predicate::Range {
                field: field.clone(),
                gt,
                gte,
                lt,
                lte,
                negate,
            },
        );
        Ok(BooleanExpr::Predicate(id))
    }

    fn compile_regexp(&mut self, body: &Value, negate: bool) -> Result<BooleanExpr, FilterError> {
        let (field, spec) = single_entry("regexp", body)?;
        let (pattern, flags) = match spec {
            Value::String(pattern) => (pattern.as_str(), ""),
            Value::Object(map) => {
                let pattern = map
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or(FilterError::missing_field("regexp"))?;
                (pattern, map.get("flags").and_then(Value::as_str).unwrap_or(""))
            }
            _ => return Err(FilterError::body_not_object("regexp")),
        };
        // only the case-insensitivity flag carries over
        let full = if flags.contains('i') {
            format!("(?i){pattern}")
        } else {
            pattern.to_string()
        };
        let compiled = Regex::new(&full).map_err(|_| FilterError::invalid_regexp(&full))?;
        let id = self.leaf(
            &field,
            "regexp",
            &full,
            negate,
            Predicate::Regexp {
                field: field.clone(),
                pattern: compiled,
                negate,
            },
        );
        Ok(BooleanExpr::Predicate(id))
    }

    fn compile_geo_distance(
        &mut self,
        body: &Value,
        negate: bool,
    ) -> Result<BooleanExpr, FilterError> {
        let Value::Object(map) = body else {
            return Err(FilterError::body_not_object("geoDistance"));
        };
        let distance = map.get("distance").ok_or(FilterError::MissingDistance)?;
        let radius_m = parse_distance(distance)?;

        let mut point_entries = map.iter().filter(|(key, _)| key.as_str() != "distance");
        let (field, point) = match (point_entries.next(), point_entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(FilterError::MissingLocation),
        };
        let center = normalize_geo_point(point)?;

        let field: FieldName = field.as_str().into();
        let repr = format!(
            "{}:{:.2}",
            geohash_key(&center, CANONICAL_GEOHASH_PRECISION)?,
            radius_m
        );
        let id = self.leaf(
            &field,
            "geoDistance",
            &repr,
            negate,
            Predicate::GeoDistance {
                field: field.clone(),
                center,
                radius_m,
                negate,
            },
        );
        Ok(BooleanExpr::Predicate(id))
    }

    fn compile_geo_polygon(
        &mut self,
        body: &Value,
        negate: bool,
    ) -> Result<BooleanExpr, FilterError> {
        let (field, spec) = single_entry("geoPolygon", body)?;
        let points_value = match spec {
            Value::Object(map) => map.get("points").ok_or(FilterError::PointsNotArray)?,
            _ => return Err(FilterError::body_not_object("geoPolygon")),
        };
        let Value::Array(raw_points) = points_value else {
            return Err(FilterError::PointsNotArray);
        };
        if raw_points.len() < 3 {
            return Err(FilterError::too_few_points(raw_points.len()));
        }
        let mut points = Vec::with_capacity(raw_points.len());
        for raw in raw_points {
            points.push(normalize_geo_point(raw)?);
        }
        self.polygon_leaf(field, points, negate)
    }

    /// A bounding box registers as its equivalent 4-corner polygon, so the
    /// spatial index only ever sees circles and polygons.
    fn compile_geo_bounding_box(
        &mut self,
        body: &Value,
        negate: bool,
    ) -> Result<BooleanExpr, FilterError> {
        let (field, spec) = single_entry("geoBoundingBox", body)?;
        let Value::Object(map) = spec else {
            return Err(FilterError::body_not_object("geoBoundingBox"));
        };
        let mut top_left = None;
        let mut bottom_right = None;
        for (key, value) in map {
            match camelize(key).as_str() {
                "topLeft" => top_left = Some(value),
                "bottomRight" => bottom_right = Some(value),
                _ => {}
            }
        }
        let top_left =
            normalize_geo_point(top_left.ok_or(FilterError::MissingCorner("top_left"))?)?;
        let bottom_right =
            normalize_geo_point(bottom_right.ok_or(FilterError::MissingCorner("bottom_right"))?)?;

        let top_right = Coordinate::new(top_left.lat(), bottom_right.lon())?;
        let bottom_left = Coordinate::new(bottom_right.lat(), top_left.lon())?;
        self.polygon_leaf(
            field,
            vec![top_left, top_right, bottom_right, bottom_left],
            negate,
        )
    }

    fn polygon_leaf(
        &mut self,
        field: FieldName,
        points: Vec<Coordinate>,
        negate: bool,
    ) -> Result<BooleanExpr, FilterError> {
        let mut repr = String::new();
        for point in &points {
            repr.push_str(&geohash_key(point, CANONICAL_GEOHASH_PRECISION)?);
            repr.push(',');
        }
        let id = self.leaf(
            &field,
            "geoPolygon",
            &repr,
            negate,
            Predicate::GeoPolygon {
                field: field.clone(),
                points,
                negate,
            },
        );
        Ok(BooleanExpr::Predicate(id))
    }

    fn leaf(
        &mut self,
        field: &FieldName,
        operator: &str,
        operand_repr: &str,
        negate: bool,
        predicate: Predicate,
    ) -> PredicateId {
        let id = canonical_id(self.collection, field, operator, operand_repr, negate);
        if self.seen.insert(id.clone()) {
            self.leaves.push(CompiledLeaf {
                id: id.clone(),
                field: field.clone(),
                predicate,
            });
        }
        id
    }
}

fn combine(mut children: Vec<BooleanExpr>, as_or: bool) -> BooleanExpr {
    if children.len() == 1 {
        children.remove(0)
    } else if as_or {
        BooleanExpr::Or(children)
    } else {
        BooleanExpr::And(children)
    }
}

fn single_entry<'a>(
    operator: &'static str,
    body: &'a Value,
) -> Result<(FieldName, &'a Value), FilterError> {
    let Value::Object(map) = body else {
        return Err(FilterError::body_not_object(operator));
    };
    if map.len() != 1 {
        return Err(FilterError::missing_field(operator));
    }
    let (field, value) = map
        .iter()
        .next()
        .ok_or(FilterError::missing_field(operator))?;
    Ok((field.as_str().into(), value))
}

/// Canonical textual form of an operand: object keys sorted, numbers
/// rendered through f64 so `1` and `1.0` agree.
fn canonical_value(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            let inner: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{k}:{}", canonical_value(&map[k])))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_value).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("{f}"),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn canonical_id(
    collection: &str,
    field: &str,
    operator: &str,
    operand_repr: &str,
    negate: bool,
) -> PredicateId {
    let canonical =
        format!("{collection}\u{1}{field}\u{1}{operator}\u{1}{operand_repr}\u{1}{negate}");
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    CheetahString::from(format!("{:016x}", hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(filter: &CompiledFilter) -> Vec<&PredicateId> {
        filter.leaves.iter().map(|leaf| &leaf.id).collect()
    }

    #[test]
    fn test_identical_clauses_share_one_id() {
        let a = compile("user", &json!({"equals": {"city": "NYC"}})).unwrap();
        let b = compile("user", &json!({"equals": {"city": "NYC"}})).unwrap();
        assert_eq!(ids(&a), ids(&b));

        let other_collection = compile("order", &json!({"equals": {"city": "NYC"}})).unwrap();
        assert_ne!(ids(&a), ids(&other_collection));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = compile(
            "user",
            &json!({"and": [{"equals": {"a": 1}}, {"exists": {"field": "b"}}]}),
        )
        .unwrap();
        let b = compile(
            "user",
            &json!({"and": [{"exists": {"field": "b"}}, {"equals": {"a": 1.0}}]}),
        )
        .unwrap();
        let mut left: Vec<_> = ids(&a);
        let mut right: Vec<_> = ids(&b);
        left.sort_unstable();
        right.sort_unstable();
        assert_eq!(left, right);
    }

    #[test]
    fn test_geo_noise_below_precision_dedups() {
        let a = compile(
            "user",
            &json!({"geoDistance": {"location": {"lat": 40.712800, "lon": -74.006000}, "distance": 500}}),
        )
        .unwrap();
        let b = compile(
            "user",
            &json!({"geoDistance": {"location": {"lat": 40.712800001, "lon": -74.005999999}, "distance": "500 m"}}),
        )
        .unwrap();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_bounding_box_matches_equivalent_polygon() {
        let bbox = compile(
            "user",
            &json!({"geoBoundingBox": {"pos": {
                "top_left": {"lat": 10.0, "lon": 0.0},
                "bottom_right": {"lat": 0.0, "lon": 10.0}
            }}}),
        )
        .unwrap();
        let poly = compile(
            "user",
            &json!({"geoPolygon": {"pos": {"points": [
                {"lat": 10.0, "lon": 0.0},
                {"lat": 10.0, "lon": 10.0},
                {"lat": 0.0, "lon": 10.0},
                {"lat": 0.0, "lon": 0.0}
            ]}}}),
        )
        .unwrap();
        assert_eq!(ids(&bbox), ids(&poly));
    }

    #[test]
    fn test_not_distributes_over_and() {
        let filter = compile(
            "user",
            &json!({"not": {"and": [{"equals": {"a": 1}}, {"equals": {"b": 2}}]}}),
        )
        .unwrap();
        assert!(matches!(filter.ast, BooleanExpr::Or(_)));
        assert!(filter.leaves.iter().all(|leaf| leaf.predicate.negate()));
    }

    #[test]
    fn test_negation_changes_the_id() {
        let plain = compile("user", &json!({"equals": {"a": 1}})).unwrap();
        let negated = compile("user", &json!({"not": {"equals": {"a": 1}}})).unwrap();
        assert_ne!(ids(&plain), ids(&negated));
    }

    #[test]
    fn test_missing_is_negated_exists() {
        let missing = compile("user", &json!({"missing": {"field": "a"}})).unwrap();
        let negated = compile("user", &json!({"not": {"exists": {"field": "a"}}})).unwrap();
        assert_eq!(ids(&missing), ids(&negated));
    }

    #[test]
    fn test_duplicate_leaves_listed_once() {
        let filter = compile(
            "user",
            &json!({"or": [{"equals": {"a": 1}}, {"equals": {"a": 1}}]}),
        )
        .unwrap();
        assert_eq!(filter.leaves.len(), 1);
    }

    #[test]
    fn test_error_cases() {
        assert_eq!(
            compile("user", &json!({})).unwrap_err(),
            FilterError::EmptyFilter
        );
        assert_eq!(
            compile("user", &json!({"geoCube": {"a": 1}})).unwrap_err(),
            FilterError::UnknownOperator("geoCube".to_string())
        );
        assert_eq!(
            compile("user", &json!({"geoDistance": {"distance": 100}})).unwrap_err(),
            FilterError::MissingLocation
        );
        assert_eq!(
            compile("user", &json!({"geoDistance": {"location": {"lat": 0, "lon": 0}}}))
                .unwrap_err(),
            FilterError::MissingDistance
        );
        assert_eq!(
            compile(
                "user",
                &json!({"geoDistance": {"location": {"lat": 0, "lon": 0}, "distance": "soon"}})
            )
            .unwrap_err(),
            FilterError::InvalidDistance("soon".to_string())
        );
        assert_eq!(
            compile("user", &json!({"geoPolygon": {"pos": {"points": "triangle"}}}))
                .unwrap_err(),
            FilterError::PointsNotArray
        );
        assert_eq!(
            compile(
                "user",
                &json!({"geoPolygon": {"pos": {"points": [
                    {"lat": 0, "lon": 0}, {"lat": 1, "lon": 1}
                ]}}})
            )
            .unwrap_err(),
            FilterError::TooFewPoints(2)
        );
        assert_eq!(
            compile("user", &json!({"and": []})).unwrap_err(),
            FilterError::EmptyCombinator("and")
        );
        assert_eq!(
            compile("user", &json!({"range": {"age": {}}})).unwrap_err(),
            FilterError::RangeWithoutBounds
        );
        assert_eq!(
            compile("user", &json!({"range": {"age": {"gte": "x"}}})).unwrap_err(),
            FilterError::InvalidRangeBound("gte")
        );
        assert!(matches!(
            compile("user", &json!({"regexp": {"name": "("}})).unwrap_err(),
            FilterError::InvalidRegexp(_)
        ));
        assert_eq!(
            compile(
                "user",
                &json!({"geoBoundingBox": {"pos": {"top_left": {"lat": 1, "lon": 1}}}})
            )
            .unwrap_err(),
            FilterError::MissingCorner("bottom_right")
        );
    }
}
