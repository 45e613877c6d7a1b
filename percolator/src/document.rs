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

//! Document flattening for predicate evaluation.

use std::collections::HashMap;

use cheetah_string::CheetahString;
use serde_json::Value;

use crate::FieldName;

/// A document with nested object keys joined by `.` into single-level
/// key/value pairs.
///
/// Built once per matching pass and discarded after. Intermediate objects
/// are retained under their own path in addition to their leaves, so a geo
/// predicate registered on `info.location` sees the nested point object
/// while `equals` predicates see `info.location.lat`.
#[derive(Debug, Default)]
pub struct FlatDocument {
    entries: HashMap<FieldName, Value>,
}

impl FlatDocument {
    /// Flatten a document's content. Non-object content yields an empty
    /// document: there is nothing addressable by field.
    pub fn flatten(content: &Value) -> Self {
        let mut entries = HashMap::new();
        if let Value::Object(map) = content {
            for (key, value) in map {
                flatten_into(key.clone(), value, &mut entries);
            }
        }
        FlatDocument { entries }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten_into(path: String, value: &Value, entries: &mut HashMap<FieldName, Value>) {
    if let Value::Object(map) = value {
        for (key, child) in map {
            flatten_into(format!("{path}.{key}"), child, entries);
        }
    }
    // arrays and scalars are leaves; objects are kept under their own path
    entries.insert(CheetahString::from(path), value.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_keys_are_dot_joined() {
        let doc = FlatDocument::flatten(&json!({
            "name": "Ada",
            "info": {"city": "NYC", "pos": {"lat": 1.0, "lon": 2.0}}
        }));

        assert_eq!(doc.get("name"), Some(&json!("Ada")));
        assert_eq!(doc.get("info.city"), Some(&json!("NYC")));
        assert_eq!(doc.get("info.pos.lat"), Some(&json!(1.0)));
        assert!(doc.contains("info.pos"));
        assert!(!doc.contains("city"));
    }

    #[test]
    fn test_intermediate_objects_are_retained() {
        let doc = FlatDocument::flatten(&json!({
            "location": {"lat": 40.7, "lon": -74.0}
        }));
        assert_eq!(doc.get("location"), Some(&json!({"lat": 40.7, "lon": -74.0})));
        assert_eq!(doc.get("location.lat"), Some(&json!(40.7)));
    }

    #[test]
    fn test_arrays_stay_whole() {
        let doc = FlatDocument::flatten(&json!({"tags": ["a", "b"]}));
        assert_eq!(doc.get("tags"), Some(&json!(["a", "b"])));
        assert!(!doc.contains("tags.0"));
    }

    #[test]
    fn test_non_object_content_is_empty() {
        assert!(FlatDocument::flatten(&json!(42)).is_empty());
        assert!(FlatDocument::flatten(&json!(null)).is_empty());
    }
}
