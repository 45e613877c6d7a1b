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

//! Real-time document-to-filter matching engine.
//!
//! Clients register boolean filter expressions ("subscriptions") scoped to
//! a collection; on every document change [`Percolator::match_document`]
//! synchronously computes the exact set of subscriptions the document
//! satisfies.
//!
//! # Architecture
//!
//! - [`compiler`] turns the JSON filter DSL into canonical, deduplicated
//!   predicates plus an and/or recombination tree per subscription.
//! - [`tree`] is the shared filter index: collection → field → canonical
//!   predicate id → predicate + subscriber set, with reference-counted
//!   pruning on removal.
//! - [`matcher`] flattens a changed document and walks only the fields it
//!   actually carries, memoizing each predicate once per pass.
//! - Geographic predicates are served by the spatial index in
//!   `percolator-geo` instead of per-predicate evaluation.
//!
//! # Usage
//!
//! ```
//! use percolator::Percolator;
//! use serde_json::json;
//!
//! let engine = Percolator::new();
//! let sub = engine
//!     .subscribe("user", &json!({"equals": {"city": "NYC"}}))
//!     .unwrap();
//!
//! let hits = engine
//!     .match_document("user", &json!({"city": "NYC", "name": "Ada"}))
//!     .unwrap();
//! assert!(hits.contains(&sub));
//! ```
//!
//! # Concurrency
//!
//! Matching passes take a read lock on the shared tree and never block each
//! other; subscription add/remove serialize on the write lock. A matching
//! pass runs to completion once started.

use cheetah_string::CheetahString;

pub mod compiler;
pub mod document;
pub mod engine;
pub mod matcher;
pub mod predicate;
pub mod tree;

/// Name of a document collection.
pub type CollectionName = CheetahString;

/// Dot-joined flattened field key, e.g. `info.city`.
pub type FieldName = CheetahString;

/// Canonical predicate id: hex hash of the normalized clause.
pub type PredicateId = CheetahString;

/// Opaque subscription identifier handed back at registration.
pub type SubscriptionId = CheetahString;

pub use compiler::compile;
pub use compiler::BooleanExpr;
pub use compiler::CompiledFilter;
pub use document::FlatDocument;
pub use engine::Percolator;
pub use matcher::MatchStats;
pub use predicate::Predicate;
pub use tree::FilterIndex;

pub use percolator_error::FilterError;
pub use percolator_error::GeoError;
pub use percolator_error::MatchError;
