//! Content digests for job payloads.
//!
//! A job's cache key is the SHA-256 of its payload in canonical form:
//! object keys sorted at every nesting level, compact separators, no
//! insignificant whitespace. Two submissions that differ only in key
//! order or formatting therefore share a digest, across process
//! restarts.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Serialize a JSON value deterministically.
///
/// Keys are emitted in lexicographic order regardless of the order they
/// were parsed in, so the output is independent of the input
/// representation.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Content digest of a job payload: SHA-256 over the canonical form,
/// lowercase hex.
pub fn payload_digest(payload: &Value) -> String {
    sha256_hex(canonical_json(payload).as_bytes())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Object keys are plain strings; serde_json escapes them.
                out.push_str(&serde_json::to_string(key).expect("string serialization"));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single compact rendering.
        other => {
            out.push_str(&serde_json::to_string(other).expect("scalar serialization"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_sorts_keys_at_every_level() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"z":true,"y":false}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"y":false,"z":true},"b":1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"y":false,"z":true},"b":1}"#);
    }

    #[test]
    fn canonical_is_whitespace_insensitive() {
        let a: Value = serde_json::from_str("{ \"k\" : [ 1 , 2 ] }").unwrap();
        let b: Value = serde_json::from_str(r#"{"k":[1,2]}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn canonical_preserves_array_order() {
        let a = json!({"k": [2, 1]});
        let b = json!({"k": [1, 2]});
        assert_ne!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn equivalent_payloads_share_a_digest() {
        let a: Value =
            serde_json::from_str(r#"{"9":{"class_type":"Save","inputs":{"x":1}}}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{ "9": {"inputs": {"x": 1}, "class_type": "Save"} }"#).unwrap();
        assert_eq!(payload_digest(&a), payload_digest(&b));
    }

    #[test]
    fn digest_is_64_hex_chars() {
        let d = payload_digest(&json!({"node": 1}));
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_payloads_get_distinct_digests() {
        assert_ne!(
            payload_digest(&json!({"n": 1})),
            payload_digest(&json!({"n": 2}))
        );
    }
}
