//! Payload values
//!
//! Payloads use the MessagePack data model, which is a superset of JSON:
//! it also carries raw binary, extension values and maps keyed by any
//! value. Payloads decoded by the binary codec pass through unchanged.
//! The JSON codec maps binary to an array of byte values and non-string
//! map keys to their JSON text, as `serde_json` does for any such value.

pub use rmpv::Value;

/// Convert a JSON value into a payload
pub fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::from(u)
            } else if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                n.as_f64().map_or(Value::Nil, Value::F64)
            }
        }
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (Value::from(k), from_json(v)))
                .collect(),
        ),
    }
}

/// Look up a string key in a map payload
///
/// Returns `None` when the value is not a map or has no such key. With
/// duplicate keys the last one wins, matching decode order.
pub fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let Value::Map(entries) = value else {
        return None;
    };
    entries
        .iter()
        .rev()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}
