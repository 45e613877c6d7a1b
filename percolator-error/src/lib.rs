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

//! Error types for the percolator matching engine.
//!
//! Each concern gets its own enum with a distinct, stable message per
//! cause: [`GeoError`] for coordinate handling, [`FilterError`] for
//! registration-time filter rejection, [`MatchError`] for failures on the
//! matching path.

// Geo error module
pub mod geo_error;

// Filter error module
pub mod filter_error;

// Match error module
pub mod match_error;

pub use filter_error::FilterError;
pub use geo_error::GeoError;
pub use match_error::MatchError;
