//! Structural comparison of route configurations.
//!
//! # Design Decisions
//! - Arrays are always order-sensitive: route order is match order
//! - Object key order is a policy ([`KeyOrder`]); by default it is ignored so
//!   reformatting a file does not tear down and rebuild every route
//! - Numbers compare by value, so `1` and `1.0` are equal; two integers
//!   compare exactly
//! - Other scalars compare by JSON value

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether object key order takes part in equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOrder {
    /// Same keys in a different order is a change.
    Significant,
    /// Same keys in any order compare equal.
    #[default]
    Insignificant,
}

/// Deep structural equality under the given key order policy.
pub fn configs_equal(a: &Value, b: &Value, key_order: KeyOrder) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            if left.len() != right.len() {
                return false;
            }
            match key_order {
                KeyOrder::Significant => left
                    .iter()
                    .zip(right.iter())
                    .all(|((lk, lv), (rk, rv))| lk == rk && configs_equal(lv, rv, key_order)),
                KeyOrder::Insignificant => left
                    .iter()
                    .all(|(key, lv)| right.get(key).is_some_and(|rv| configs_equal(lv, rv, key_order))),
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(lv, rv)| configs_equal(lv, rv, key_order))
        }
        (Value::Number(left), Value::Number(right)) => {
            left == right || ((left.is_f64() || right.is_f64()) && left.as_f64() == right.as_f64())
        }
        _ => a == b,
    }
}

/// True when `new` matches the last applied value. Nothing applied yet is
/// never "unchanged".
pub fn is_unchanged(new: &Value, last: Option<&Value>, key_order: KeyOrder) -> bool {
    last.is_some_and(|last| configs_equal(new, last, key_order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reordered() -> (Value, Value) {
        let a: Value = serde_json::from_str(
            r#"{"/api": {"target": "http://a", "changeOrigin": true}, "/v2": {"target": "http://b"}}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"/v2": {"target": "http://b"}, "/api": {"changeOrigin": true, "target": "http://a"}}"#,
        )
        .unwrap();
        (a, b)
    }

    #[test]
    fn test_key_order_insignificant() {
        let (a, b) = reordered();
        assert!(configs_equal(&a, &b, KeyOrder::Insignificant));
    }

    #[test]
    fn test_key_order_significant() {
        let (a, b) = reordered();
        assert!(!configs_equal(&a, &b, KeyOrder::Significant));
        assert!(configs_equal(&a, &a.clone(), KeyOrder::Significant));
    }

    #[test]
    fn test_array_order_always_matters() {
        let a = json!([{"context": "/a"}, {"context": "/b"}]);
        let b = json!([{"context": "/b"}, {"context": "/a"}]);
        assert!(!configs_equal(&a, &b, KeyOrder::Insignificant));
        assert!(!configs_equal(&a, &b, KeyOrder::Significant));
    }

    #[test]
    fn test_nested_value_change_detected() {
        let a = json!({"/api": {"pathRewrite": {"^/api": ""}}});
        let b = json!({"/api": {"pathRewrite": {"^/api": "/v1"}}});
        assert!(!configs_equal(&a, &b, KeyOrder::Insignificant));
    }

    #[test]
    fn test_extra_key_detected() {
        let a = json!({"/api": {"target": "http://a"}});
        let b = json!({"/api": {"target": "http://a", "changeOrigin": false}});
        assert!(!configs_equal(&a, &b, KeyOrder::Insignificant));
        assert!(!configs_equal(&b, &a, KeyOrder::Insignificant));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let a: Value = serde_json::from_str(r#"[{"context": "/api", "timeout": 1}]"#).unwrap();
        let b: Value = serde_json::from_str(r#"[{"context": "/api", "timeout": 1.0}]"#).unwrap();
        assert!(configs_equal(&a, &b, KeyOrder::Insignificant));
        assert!(configs_equal(&a, &b, KeyOrder::Significant));

        let c: Value = serde_json::from_str(r#"[{"context": "/api", "timeout": 1.5}]"#).unwrap();
        assert!(!configs_equal(&a, &c, KeyOrder::Insignificant));
        assert!(!configs_equal(&json!(u64::MAX), &json!(u64::MAX - 1), KeyOrder::Insignificant));
    }

    #[test]
    fn test_nothing_applied_is_never_unchanged() {
        let value = json!([]);
        assert!(!is_unchanged(&value, None, KeyOrder::Insignificant));
        assert!(is_unchanged(&value, Some(&json!([])), KeyOrder::Insignificant));
    }
}
