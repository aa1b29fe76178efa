//! JSON path helpers.
//!
//! `extract_paths` enumerates the addressable fields of an arbitrary JSON
//! payload (used to offer field choices for a widget), and `get_value` reads a
//! single field back by one of those paths. Paths use dot notation for object
//! keys and a `[0]` suffix for array positions, e.g. `data.items[0].price`.

use serde_json::{Map, Value};

/// Every leaf and array path in `value`, depth-first in key insertion order.
///
/// Arrays are assumed homogeneous: only the first element is sampled to
/// describe the shape of the rest.
pub fn extract_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    walk(value, "", &mut paths);
    paths
}

fn walk(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(child, &path, out);
            }
        }
        Value::Array(items) => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
            if let Some(first) = items.first() {
                let indexed = format!("{prefix}[0]");
                match first {
                    Value::Object(_) => walk(first, &indexed, out),
                    _ => out.push(indexed),
                }
            }
        }
        // Primitives, nulls and empty objects
        _ => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
    }
}

/// Read the value at `path`, or `None` when any segment is missing.
///
/// Segments are separated by `.`, `[` or `]`. A segment is used as an array
/// index when the current value is an array and the segment is numeric,
/// otherwise as an object key. Malformed paths degrade to `None`.
pub fn get_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() || value.is_null() {
        return None;
    }
    descend(value, segments(path))
}

/// Like [`get_value`], rooted at an object's field map.
pub fn get_field<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = segments(path);
    let first = fields.get(segments.next()?)?;
    descend(first, segments)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c| matches!(c, '.' | '[' | ']'))
        .filter(|s| !s.is_empty())
}

fn descend<'a, 'p>(
    start: &'a Value,
    segments: impl Iterator<Item = &'p str>,
) -> Option<&'a Value> {
    let mut current = start;
    for segment in segments {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}
