//! Combining per-chunk payloads into one document payload.
//!
//! Relations and specifications are concatenated in chunk order with no
//! de-duplication, so an item found in two overlapping chunks appears twice.

use serde_json::{json, Map, Value};

use super::outcome::is_empty_payload;

pub fn merge_compatibility<'a, I>(payloads: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    json!({ "relations": concat_arrays(payloads, "relations") })
}

pub fn merge_technical<'a, I>(payloads: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    json!({ "specifications": concat_arrays(payloads, "specifications") })
}

/// The first non-empty payload is the base. `compatible_products` lists are
/// concatenated and distinct non-empty `additional_info` strings are joined
/// with `". "`. Returns `{}` when every payload is empty.
pub fn merge_faq<'a, I>(payloads: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let payloads: Vec<&Value> = payloads
        .into_iter()
        .filter(|p| !is_empty_payload(p))
        .collect();

    let Some(first) = payloads.first() else {
        return Value::Object(Map::new());
    };
    let Value::Object(base) = first else {
        // Not a map, nothing to combine field by field
        return (*first).clone();
    };
    let mut merged = base.clone();

    let products: Vec<Value> = payloads
        .iter()
        .filter_map(|p| p.get("compatible_products"))
        .filter_map(Value::as_array)
        .flatten()
        .cloned()
        .collect();
    if payloads
        .iter()
        .any(|p| p.get("compatible_products").is_some_and(Value::is_array))
    {
        merged.insert("compatible_products".to_string(), Value::Array(products));
    }

    let mut infos: Vec<&str> = Vec::new();
    for info in payloads
        .iter()
        .filter_map(|p| p.get("additional_info"))
        .filter_map(Value::as_str)
        .map(str::trim)
    {
        if !info.is_empty() && !infos.contains(&info) {
            infos.push(info);
        }
    }
    if !infos.is_empty() {
        merged.insert(
            "additional_info".to_string(),
            Value::String(infos.join(". ")),
        );
    }

    Value::Object(merged)
}

/// Collects `payload[key]` arrays in order. A bare array payload is taken as
/// the list itself; anything else contributes nothing.
fn concat_arrays<'a, I>(payloads: I, key: &str) -> Vec<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut items = Vec::new();
    for payload in payloads {
        let list = match payload {
            Value::Array(list) => Some(list),
            Value::Object(map) => map.get(key).and_then(Value::as_array),
            _ => None,
        };
        if let Some(list) = list {
            items.extend(list.iter().cloned());
        }
    }
    items
}
