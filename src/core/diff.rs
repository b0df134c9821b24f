//! Structural comparison of prop mappings
//!
//! Every binder update goes through these helpers so that only changed
//! attributes reach the engine.

use serde_json::{Map, Value};

/// Keys to set and keys to clear when moving from one mapping to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    /// Keys present in the new mapping whose value differs (or is new)
    pub changed: Vec<String>,
    /// Keys that only the old mapping carries
    pub removed: Vec<String>,
}

impl KeyDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Deep structural equality
///
/// Mapping keys are compared as sets, a key holding `null` equals an absent
/// key, and numbers compare by value so `1` equals `1.0`.
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => maps_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// [`equals`] over optional values, with `None` standing for `null`
pub fn equals_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    equals(a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null))
}

fn maps_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.iter()
        .all(|(key, value)| equals(value, b.get(key).unwrap_or(&Value::Null)))
        && b.iter()
            .filter(|(key, _)| !a.contains_key(*key))
            .all(|(_, value)| value.is_null())
}

/// Computes which keys to set and which to clear
pub fn diff_keys(new: &Map<String, Value>, old: &Map<String, Value>) -> KeyDiff {
    let mut diff = KeyDiff::default();
    for (key, value) in new {
        if value.is_null() {
            continue;
        }
        if !equals_opt(Some(value), old.get(key)) {
            diff.changed.push(key.clone());
        }
    }
    for (key, value) in old {
        if value.is_null() {
            continue;
        }
        if new.get(key).map_or(true, Value::is_null) {
            diff.removed.push(key.clone());
        }
    }
    diff
}

/// Drops null entries from a mapping, keeping `""`, `false` and `0`
pub fn compact(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Borrows a value as a mapping, treating anything else as empty
pub fn as_map(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_equals_ignores_key_order_and_nulls() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":[1,2]},"d":null}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"c":[1,2]},"a":1.0}"#).unwrap();
        assert!(equals(&a, &b));
        assert!(equals(&b, &a));
        assert!(equals(&a, &a));
    }

    #[test]
    fn test_equals_detects_nested_change() {
        let a = json!({"a": [1, {"x": "y"}]});
        let b = json!({"a": [1, {"x": "z"}]});
        assert!(!equals(&a, &b));
        assert!(!equals(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(!equals(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_diff_keys_minimal() {
        let old = obj(json!({"a": 1, "b": 2}));
        let new = obj(json!({"a": 1, "b": 3, "c": 4}));
        let diff = diff_keys(&new, &old);
        assert_eq!(diff.changed, vec!["b".to_string(), "c".to_string()]);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_diff_keys_removed() {
        let old = obj(json!({"a": 1, "b": 2, "gone": null}));
        let new = obj(json!({"a": 1, "b": null}));
        let diff = diff_keys(&new, &old);
        assert!(diff.changed.is_empty());
        assert_eq!(diff.removed, vec!["b".to_string()]);
    }

    #[test]
    fn test_diff_keys_identical_is_empty() {
        let map = obj(json!({"line-color": ["get", "color"], "line-width": 2}));
        assert!(diff_keys(&map, &map).is_empty());
    }

    #[test]
    fn test_compact_keeps_falsy_scalars() {
        let map = obj(json!({"a": null, "b": false, "c": 0, "d": ""}));
        let compacted = compact(&map);
        assert_eq!(compacted.len(), 3);
        assert!(!compacted.contains_key("a"));
    }
}
