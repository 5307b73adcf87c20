use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Opaque, ordered key/value payload carried in a transaction's `data` field.
///
/// Top-level keys are kept sorted by the `BTreeMap`. The core never inspects
/// the values; feature builders decide their shape.
pub type Payload = BTreeMap<String, Value>;

/// Rebuild a JSON value with every object's keys in sorted order.
///
/// Signing needs byte-stable output regardless of how the value was built or
/// which `serde_json` map backend is compiled in.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonicalize every value of a payload.
pub fn canonicalize_payload(payload: &Payload) -> Payload {
    payload
        .iter()
        .map(|(k, v)| (k.clone(), canonicalize(v)))
        .collect()
}
