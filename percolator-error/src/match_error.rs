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

/// Error types for the matching path and subscription removal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Match request is missing a collection")]
    MissingCollection,

    /// The reference-counting invariant was violated: a subscription
    /// record points at a tree path that no longer holds a node.
    #[error("Filter tree corrupted: no node at path '{0}'")]
    CorruptedPath(String),
}

impl MatchError {
    pub fn corrupted_path(path: impl Into<String>) -> Self {
        MatchError::CorruptedPath(path.into())
    }
}
