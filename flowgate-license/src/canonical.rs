//! Canonical JSON encoding for signing and verification.
//!
//! The issuing server signs the canonical bytes of the payload, not the
//! document as transmitted. Any deviation here (key order, whitespace,
//! encoding) makes every verification fail, so the rules are fixed:
//! object keys sorted lexicographically at every nesting level, compact
//! separators, UTF-8.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Serializes a JSON value to its canonical byte encoding.
///
/// Keys are re-sorted explicitly rather than relying on `serde_json`'s
/// default map ordering, so enabling `preserve_order` anywhere in the
/// dependency graph cannot silently change the signed bytes.
///
/// # Errors
///
/// Returns an error only if the value is not serializable, which signals
/// an internal fault rather than bad input.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&sorted(value))
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let entries: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::with_capacity(map.len());
            for (key, val) in entries {
                out.insert(key.clone(), sorted(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encoding_is_deterministic_across_key_order() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"z":true,"y":[1,2]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"y":[1,2],"z":true},"b":1}"#).unwrap();
        assert_eq!(
            canonical_json_bytes(&a).unwrap(),
            canonical_json_bytes(&b).unwrap()
        );
    }

    #[test]
    fn no_insignificant_whitespace() {
        let value = json!({"b": [1, 2, 3], "a": "x"});
        let bytes = canonical_json_bytes(&value).unwrap();
        assert_eq!(bytes, br#"{"a":"x","b":[1,2,3]}"#.to_vec());
    }

    #[test]
    fn nested_keys_are_sorted() {
        let value = json!({"outer": {"c": 1, "a": 2, "b": {"z": 0, "m": 1}}});
        let bytes = canonical_json_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"outer":{"a":2,"b":{"m":1,"z":0},"c":1}}"#
        );
    }

    #[test]
    fn non_ascii_is_utf8_not_escaped() {
        let value = json!({"name": "Müller GmbH"});
        let bytes = canonical_json_bytes(&value).unwrap();
        assert_eq!(bytes, "{\"name\":\"Müller GmbH\"}".as_bytes().to_vec());
    }
}
