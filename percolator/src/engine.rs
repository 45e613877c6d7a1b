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

//! The engine facade tying compiler, tree, and matcher together.

use std::collections::HashSet;

use cheetah_string::CheetahString;
use percolator_error::FilterError;
use percolator_error::MatchError;
use serde_json::Value;
use tracing::info;

use crate::compiler::compile;
use crate::matcher;
use crate::tree::FilterIndex;
use crate::MatchStats;
use crate::SubscriptionId;

/// The document-to-filter matching engine.
///
/// An explicitly constructed value owned by the surrounding server; clone
/// handles share the same underlying filter index. All operations are
/// synchronous: `match_document` returns the complete match set before the
/// caller notifies anyone.
#[derive(Clone, Default)]
pub struct Percolator {
    index: FilterIndex,
}

impl Percolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter on a collection; returns the subscription id used
    /// to route notifications and to unsubscribe later.
    ///
    /// Malformed filters are rejected here, never at match time.
    pub fn subscribe(
        &self,
        collection: impl Into<CheetahString>,
        filter: &Value,
    ) -> Result<SubscriptionId, FilterError> {
        let collection = collection.into();
        // symmetric with the matching path, which rejects "" as well
        if collection.is_empty() {
            return Err(FilterError::EmptyCollection);
        }
        let compiled = compile(collection.as_str(), filter)?;
        let id: SubscriptionId = uuid::Uuid::new_v4().to_string().into();
        info!(collection = %collection, subscription = %id, "subscribe");
        self.index.register(collection, compiled, id.clone());
        Ok(id)
    }

    /// Remove a subscription, pruning shared predicates it was the last
    /// user of. Returns whether the id was known; repeat calls are no-ops.
    pub fn unsubscribe(&self, subscription_id: &SubscriptionId) -> Result<bool, MatchError> {
        self.index.unregister(subscription_id)
    }

    /// Compute the set of subscriptions the document satisfies.
    pub fn match_document(
        &self,
        collection: &str,
        content: &Value,
    ) -> Result<HashSet<SubscriptionId>, MatchError> {
        matcher::match_document(&self.index, collection, content)
    }

    /// As [`Percolator::match_document`], with pass instrumentation.
    pub fn match_document_with_stats(
        &self,
        collection: &str,
        content: &Value,
    ) -> Result<(HashSet<SubscriptionId>, MatchStats), MatchError> {
        matcher::match_document_with_stats(&self.index, collection, content)
    }

    /// The shared filter index backing this engine.
    pub fn index(&self) -> &FilterIndex {
        &self.index
    }
}
