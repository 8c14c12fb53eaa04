//! Minimal JSON-path scalar extraction for `env_from`.
//!
//! A path is a dot-separated chain of object keys and/or array indices,
//! e.g. `data.id` or `items.0.name`. Missing paths resolve to `None`
//! (rendered as an empty string by the caller) rather than erroring.

use serde_json::Value;

/// Walk `path` against `root`, returning the resolved scalar rendered as a
/// string. Non-scalar results (objects, arrays) also resolve to `None` —
/// `env_from` only ever extracts scalars.
#[must_use]
pub fn extract(root: &Value, path: &str) -> Option<String> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match (current, segment.parse::<usize>()) {
            (Value::Object(map), _) => map.get(segment)?,
            (Value::Array(items), Ok(idx)) => items.get(idx)?,
            _ => return None,
        };
    }
    scalar_to_string(current)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Object(_) | Value::Array(_) => None,
    }
}
