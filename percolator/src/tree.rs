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

//! The shared filter index ("filter tree").
//!
//! An arena of nodes indexed by path key: collection → field → canonical
//! predicate id. Deletion walks string/hash keys only — there are no parent
//! back-references to keep consistent. Invariant: a predicate node exists
//! iff its subscriber set is non-empty; empty field and collection entries
//! are pruned eagerly.
//!
//! Reads (matching passes) share a `parking_lot` read lock and never block
//! each other; subscription add/remove serialize on the write lock.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use percolator_error::MatchError;
use percolator_geo::SpatialIndex;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::compiler::BooleanExpr;
use crate::compiler::CompiledFilter;
use crate::predicate::Predicate;
use crate::CollectionName;
use crate::FieldName;
use crate::PredicateId;
use crate::SubscriptionId;

/// One canonical predicate plus everyone subscribed to it.
pub(crate) struct PredicateNode {
    pub(crate) predicate: Predicate,
    pub(crate) subscribers: HashSet<SubscriptionId>,
}

#[derive(Default)]
pub(crate) struct FieldNode {
    pub(crate) predicates: HashMap<PredicateId, PredicateNode>,
    /// Geo predicate ids on this field, resolved through the spatial index.
    pub(crate) geo: HashSet<PredicateId>,
    /// Predicates that match when the field is absent from a document
    /// (negated leaves, including `missing` and negated geo).
    pub(crate) absent_match: HashSet<PredicateId>,
}

#[derive(Default)]
pub(crate) struct CollectionNode {
    pub(crate) fields: HashMap<FieldName, FieldNode>,
    pub(crate) spatial: SpatialIndex,
}

pub(crate) struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) collection: CollectionName,
    pub(crate) ast: BooleanExpr,
    /// Distinct tree paths this subscription holds references on.
    paths: Vec<(FieldName, PredicateId)>,
}

#[derive(Default)]
pub(crate) struct FilterTree {
    pub(crate) collections: HashMap<CollectionName, CollectionNode>,
    pub(crate) subscriptions: HashMap<SubscriptionId, Subscription>,
}

/// Handle to the shared filter tree.
///
/// Cloning is cheap and shares the underlying tree.
#[derive(Clone, Default)]
pub struct FilterIndex {
    inner: Arc<RwLock<FilterTree>>,
}

impl FilterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, FilterTree> {
        self.inner.read()
    }

    /// Install a compiled filter under `subscription_id`.
    ///
    /// Leaves whose canonical id already exists gain a subscriber; new ids
    /// create nodes (and spatial index entries for geo predicates).
    pub fn register(
        &self,
        collection: CollectionName,
        compiled: CompiledFilter,
        subscription_id: SubscriptionId,
    ) {
        let mut tree = self.inner.write();
        let node = tree.collections.entry(collection.clone()).or_default();

        let mut paths = Vec::with_capacity(compiled.leaves.len());
        for leaf in compiled.leaves {
            let field_node = node.fields.entry(leaf.field.clone()).or_default();
            if let Some(existing) = field_node.predicates.get_mut(&leaf.id) {
                existing.subscribers.insert(subscription_id.clone());
            } else {
                if let Some(shape) = leaf.predicate.shape() {
                    node.spatial
                        .insert(leaf.field.clone(), leaf.id.clone(), shape);
                }
                if leaf.predicate.is_geo() {
                    field_node.geo.insert(leaf.id.clone());
                }
                if leaf.predicate.negate() {
                    field_node.absent_match.insert(leaf.id.clone());
                }
                let mut subscribers = HashSet::new();
                subscribers.insert(subscription_id.clone());
                field_node.predicates.insert(
                    leaf.id.clone(),
                    PredicateNode {
                        predicate: leaf.predicate,
                        subscribers,
                    },
                );
            }
            paths.push((leaf.field, leaf.id));
        }

        info!(
            collection = %collection,
            subscription = %subscription_id,
            predicates = paths.len(),
            "registered subscription"
        );
        tree.subscriptions.insert(
            subscription_id.clone(),
            Subscription {
                id: subscription_id,
                collection,
                ast: compiled.ast,
                paths,
            },
        );
    }

    /// Remove a subscription, dropping its reference on every predicate it
    /// used and pruning now-empty nodes up the path.
    ///
    /// Returns `Ok(false)` when the id is unknown (idempotent). A missing
    /// node at a recorded path means the reference-counting invariant was
    /// broken; that is surfaced as [`MatchError::CorruptedPath`].
    pub fn unregister(&self, subscription_id: &SubscriptionId) -> Result<bool, MatchError> {
        let mut tree = self.inner.write();
        let Some(subscription) = tree.subscriptions.remove(subscription_id) else {
            debug!(subscription = %subscription_id, "unregister: unknown subscription");
            return Ok(false);
        };

        let collection = subscription.collection;
        for (field, predicate_id) in &subscription.paths {
            let path = || format!("{collection}/{field}/{predicate_id}");

            let Some(node) = tree.collections.get_mut(&collection) else {
                error!(path = %path(), "filter tree corrupted: collection vanished");
                return Err(MatchError::corrupted_path(path()));
            };
            let Some(field_node) = node.fields.get_mut(field) else {
                error!(path = %path(), "filter tree corrupted: field vanished");
                return Err(MatchError::corrupted_path(path()));
            };
            let Some(predicate_node) = field_node.predicates.get_mut(predicate_id) else {
                error!(path = %path(), "filter tree corrupted: predicate vanished");
                return Err(MatchError::corrupted_path(path()));
            };

            predicate_node.subscribers.remove(&subscription.id);
            if predicate_node.subscribers.is_empty() {
                field_node.predicates.remove(predicate_id);
                field_node.geo.remove(predicate_id);
                field_node.absent_match.remove(predicate_id);
                node.spatial.remove(field.as_str(), predicate_id.as_str());
                if field_node.predicates.is_empty() {
                    node.fields.remove(field);
                }
                if node.fields.is_empty() {
                    tree.collections.remove(&collection);
                }
            }
        }

        info!(
            collection = %collection,
            subscription = %subscription_id,
            "unregistered subscription"
        );
        Ok(true)
    }

    /// Whether any predicate is registered for `collection`.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.inner.read().collections.contains_key(collection)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().collections.is_empty()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.read().subscriptions.len()
    }

    /// Number of predicate nodes registered under `collection`.
    pub fn predicate_count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(collection)
            .map(|node| node.fields.values().map(|f| f.predicates.len()).sum())
            .unwrap_or(0)
    }
}
