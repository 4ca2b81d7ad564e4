// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dotted property paths over dynamic JSON trees, and the `{{path}}`
//! payload-template resolution used by cascading rules.
//!
//! Paths are split on `.` and applied segment by segment; a segment that
//! parses as an index steps into arrays. A missing segment resolves to
//! `None` rather than an error — callers treat absence as the `null`
//! sentinel.

use serde_json::Value;

/// Resolve a dotted path against a value tree.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let idx: usize = segment.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dotted path, cloning the result, with `null` for absence.
pub fn resolve_or_null(root: &Value, path: &str) -> Value {
    resolve(root, path).cloned().unwrap_or(Value::Null)
}

/// Stringify a scalar for use as a hash-index key.
///
/// Strings are used verbatim (no quotes) so that a rule comparing
/// `"P1"` to the string property `"P1"` lands in the same bucket;
/// everything else uses compact JSON.
pub fn index_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns true if the value is a scalar (not an object or array).
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Extract the inner path from a `"{{dotted.path}}"` template string.
fn template_path(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

/// Resolve a payload template against a source instance view.
///
/// Any string value that is exactly `"{{path}}"` is replaced by the
/// dereferenced value (or `null` when the path is absent); objects and
/// arrays are processed recursively; all other values pass through.
pub fn resolve_template(template: &Value, source: &Value) -> Value {
    match template {
        Value::String(s) => match template_path(s) {
            Some(path) => resolve_or_null(source, path),
            None => template.clone(),
        },
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_template(v, source)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_template(v, source)).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
