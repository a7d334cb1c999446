// src/project.rs

//! Dot-path field projection over JSON documents.
//!
//! Detail documents are free-form nested JSON, so field selection works on
//! the `serde_json::Value` variant tree directly, independent of any schema.
//! A path like `company_contact_details.company_name` or `ipo_details.0.1`
//! addresses a nested field; a numeric segment indexes into an array.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Resolve a dot-path against a document, returning the addressed value.
///
/// Returns `None` for a missing key, an out-of-range index, or an attempt
/// to descend into a scalar.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Project a document down to the union of the requested dot-paths.
///
/// The output preserves the original nesting shape; siblings that were not
/// requested are omitted. Array positions below a requested index are filled
/// with `null` so indices stay addressable. Paths that do not resolve are
/// skipped; an empty path set returns the document unmodified.
pub fn project(doc: &Value, paths: &[String]) -> Value {
    let mut seen = HashSet::new();
    let requested: Vec<&str> = paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(*p))
        .collect();

    if requested.is_empty() {
        return doc.clone();
    }

    let mut result = match doc {
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    };

    for path in requested {
        if let Some(value) = lookup(doc, path) {
            let segments: Vec<&str> = path.split('.').collect();
            merge_at(&mut result, &segments, value.clone());
        }
    }

    result
}

/// Write `leaf` into `target` at the position named by `segments`, creating
/// intermediate objects/arrays as needed.
fn merge_at(target: &mut Value, segments: &[&str], leaf: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = leaf;
        return;
    };

    match head.parse::<usize>() {
        Ok(index) => {
            if !matches!(target, Value::Array(_)) {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(items) = target {
                while items.len() <= index {
                    items.push(Value::Null);
                }
                merge_at(&mut items[index], rest, leaf);
            }
        }
        Err(_) => {
            if !matches!(target, Value::Object(_)) {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let slot = map.entry(head.to_string()).or_insert(Value::Null);
                merge_at(slot, rest, leaf);
            }
        }
    }
}
