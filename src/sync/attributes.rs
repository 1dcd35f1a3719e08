//! Normalization of attribute-selection payloads.
//!
//! The selection collaborator has no fixed schema, so the synchronizer
//! accepts whatever shape comes back and flattens it into a string-keyed
//! map. An `items` array of key/value entries wins; failing that, a
//! `selections` or `attributes` object is deep-flattened into
//! `dot.separated` keys with stringified scalar values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Flatten an arbitrary selection payload into `key -> value` strings.
/// Unrecognized shapes yield an empty map - never an error.
pub fn normalize_selections(payload: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    if let Some(items) = payload.get("items").and_then(Value::as_array) {
        for item in items {
            let key = item
                .get("key")
                .or_else(|| item.get("name"))
                .and_then(Value::as_str);
            if let Some(key) = key {
                let value = item.get("value").map(stringify).unwrap_or_default();
                out.insert(key.to_string(), value);
            }
        }
        return out;
    }

    for field in ["selections", "attributes"] {
        if let Some(object) = payload.get(field).and_then(Value::as_object) {
            flatten_into(&mut out, "", object);
            return out;
        }
    }

    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(out, &path, nested),
            other => {
                out.insert(path, stringify(other));
            }
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Arrays (and anything else compound) keep their JSON text.
        other => other.to_string(),
    }
}

/// Split a raw terms string into discrete entries: newline- or
/// comma-separated, trimmed, empties dropped.
pub fn split_terms(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
