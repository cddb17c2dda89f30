//! Settings layer merge.
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;
use std::collections::BTreeMap;

use super::effective::ConfigOrigin;

/// Deep merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Record `origin` for every leaf key path set by `value`.
///
/// Arrays and scalars are leaves; a path overridden by a later layer
/// takes that layer's origin.
pub fn record_origins(value: &Value, origin: ConfigOrigin, origins: &mut BTreeMap<String, ConfigOrigin>) {
    fn walk(value: &Value, path: &str, origin: ConfigOrigin, origins: &mut BTreeMap<String, ConfigOrigin>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    walk(child, &child_path, origin, origins);
                }
            }
            _ if !path.is_empty() => {
                origins.insert(path.to_string(), origin);
            }
            _ => {}
        }
    }
    walk(value, "", origin, origins);
}

/// Merge layers lowest first, returning the merged value and per-key origins.
pub fn merge_layers(layers: Vec<(ConfigOrigin, Value)>) -> (Value, BTreeMap<String, ConfigOrigin>) {
    let mut origins = BTreeMap::new();
    let mut merged = Value::Null;
    for (origin, layer) in layers {
        record_origins(&layer, origin, &mut origins);
        merged = deep_merge(merged, layer);
    }
    (merged, origins)
}
