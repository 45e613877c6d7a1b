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

//! The matching pass: which subscriptions does this document satisfy?
//!
//! Cost is proportional to the document, not the subscription count: only
//! fields actually present in the document are walked (plus the small
//! per-field absence sets for negated predicates), each predicate is
//! evaluated at most once per pass, and geo fields go through the spatial
//! index rather than per-shape evaluation.

use std::collections::HashMap;
use std::collections::HashSet;

use percolator_error::MatchError;
use percolator_geo::normalize_geo_point;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use crate::compiler::BooleanExpr;
use crate::document::FlatDocument;
use crate::tree::CollectionNode;
use crate::tree::FieldNode;
use crate::tree::FilterIndex;
use crate::PredicateId;
use crate::SubscriptionId;

/// Per-pass instrumentation, serializable for status endpoints and logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    /// Leaf predicates resolved during the pass (memoized evaluations).
    pub evaluations: usize,
}

/// Match a document against every subscription on `collection`.
pub fn match_document(
    index: &FilterIndex,
    collection: &str,
    content: &Value,
) -> Result<HashSet<SubscriptionId>, MatchError> {
    match_document_with_stats(index, collection, content).map(|(matched, _)| matched)
}

/// As [`match_document`], also returning pass instrumentation.
pub fn match_document_with_stats(
    index: &FilterIndex,
    collection: &str,
    content: &Value,
) -> Result<(HashSet<SubscriptionId>, MatchStats), MatchError> {
    if collection.is_empty() {
        return Err(MatchError::MissingCollection);
    }

    let tree = index.read();
    // fast path: nothing registered for this collection
    let Some(node) = tree.collections.get(collection) else {
        return Ok((HashSet::new(), MatchStats::default()));
    };

    let doc = FlatDocument::flatten(content);
    let mut memo: HashMap<&PredicateId, bool> = HashMap::new();
    let mut candidates: HashSet<&SubscriptionId> = HashSet::new();

    // fields the document carries
    for field in doc.keys() {
        let Some(field_node) = node.fields.get(field.as_str()) else {
            continue;
        };
        resolve_geo(node, field_node, field.as_str(), &doc, &mut memo, &mut candidates);
        for (id, predicate_node) in &field_node.predicates {
            if predicate_node.predicate.is_geo() || memo.contains_key(id) {
                continue;
            }
            let hit = predicate_node.predicate.evaluate(&doc);
            memo.insert(id, hit);
            if hit {
                candidates.extend(&predicate_node.subscribers);
            }
        }
    }

    // absence pass: negated predicates on fields the document lacks are
    // vacuously satisfied
    for (field, field_node) in &node.fields {
        if doc.contains(field.as_str()) || field_node.absent_match.is_empty() {
            continue;
        }
        for id in &field_node.absent_match {
            memo.insert(id, true);
            if let Some(predicate_node) = field_node.predicates.get(id) {
                candidates.extend(&predicate_node.subscribers);
            }
        }
    }

    let stats = MatchStats {
        evaluations: memo.len(),
    };

    let mut matched = HashSet::new();
    for candidate in candidates {
        let Some(subscription) = tree.subscriptions.get(candidate) else {
            // subscriber sets and subscription records are kept in lockstep;
            // a dangling id is a broken invariant, but a read must not fail
            error!(subscription = %candidate, "subscriber without subscription record");
            continue;
        };
        if evaluate_expr(&subscription.ast, &memo) {
            matched.insert(subscription.id.clone());
        }
    }

    debug!(
        collection = %collection,
        matched = matched.len(),
        evaluations = stats.evaluations,
        "matching pass complete"
    );
    Ok((matched, stats))
}

/// Resolve every geo predicate on a present field through the spatial
/// index: one point query per field instead of one distance/containment
/// computation per shape.
fn resolve_geo<'t>(
    node: &'t CollectionNode,
    field_node: &'t FieldNode,
    field: &str,
    doc: &FlatDocument,
    memo: &mut HashMap<&'t PredicateId, bool>,
    candidates: &mut HashSet<&'t SubscriptionId>,
) {
    if field_node.geo.is_empty() {
        return;
    }
    let value = match doc.get(field) {
        Some(value) => value,
        None => return,
    };
    match normalize_geo_point(value) {
        Ok(point) => {
            let contained: HashSet<_> = node.spatial.query_point(field, &point).into_iter().collect();
            for id in &field_node.geo {
                let Some(predicate_node) = field_node.predicates.get(id) else {
                    continue;
                };
                // negated shapes match everything the point misses
                let hit = contained.contains(id) != predicate_node.predicate.negate();
                memo.insert(id, hit);
                if hit {
                    candidates.extend(&predicate_node.subscribers);
                }
            }
        }
        Err(err) => {
            // not an error: the field just is not a usable point for this
            // document; negated shapes are vacuously satisfied
            debug!(field = %field, %err, "skipping unparsable geo value");
            for id in &field_node.geo {
                let Some(predicate_node) = field_node.predicates.get(id) else {
                    continue;
                };
                if predicate_node.predicate.negate() {
                    memo.insert(id, true);
                    candidates.extend(&predicate_node.subscribers);
                }
            }
        }
    }
}

fn evaluate_expr(expr: &BooleanExpr, memo: &HashMap<&PredicateId, bool>) -> bool {
    match expr {
        BooleanExpr::Predicate(id) => memo.get(id).copied().unwrap_or(false),
        // `all`/`any` short-circuit on the first decisive child
        BooleanExpr::And(children) => children.iter().all(|child| evaluate_expr(child, memo)),
        BooleanExpr::Or(children) => children.iter().any(|child| evaluate_expr(child, memo)),
    }
}
