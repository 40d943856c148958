//! Case-insensitive object keys
//!
//! gRPC clients decode service configs with Go's `encoding/json`, which
//! matches object keys to field names regardless of case. Keys are rewritten
//! to their canonical spelling before typed deserialization; when several keys
//! fold to the same field, the last one wins.

use serde::de::Error as _;
use serde_json::{Map, Value};

/// Parse JSON text and canonicalize the keys that fold to one of `fields`
///
/// The top-level value must be an object or `null`; `null` yields `None`.
pub(crate) fn parse_object(bytes: &[u8], fields: &[&str]) -> serde_json::Result<Option<Value>> {
    match serde_json::from_slice(bytes)? {
        Value::Null => Ok(None),
        value @ Value::Object(_) => Ok(Some(canonicalize(value, fields))),
        _ => Err(serde_json::Error::custom(
            "invalid type: service config must be a JSON object",
        )),
    }
}

fn canonicalize(value: Value, fields: &[&str]) -> Value {
    match value {
        Value::Object(map) => {
            let mut folded = Map::with_capacity(map.len());
            for (key, value) in map {
                let key = match fields.iter().find(|field| fold_eq(&key, field)) {
                    Some(field) => field.to_string(),
                    None => key,
                };
                folded.insert(key, canonicalize(value, fields));
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| canonicalize(item, fields))
                .collect(),
        ),
        other => other,
    }
}

/// Simple case folding as done by Go for ASCII field names
fn fold_eq(key: &str, field: &str) -> bool {
    key.chars().map(fold).eq(field.chars().map(fold))
}

fn fold(c: char) -> char {
    match c {
        // LATIN SMALL LETTER LONG S and KELVIN SIGN
        '\u{17f}' => 's',
        '\u{212a}' => 'k',
        c => c.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[&str] = &["methodConfig", "name", "service"];

    fn parse(json: &str) -> Value {
        parse_object(json.as_bytes(), FIELDS).unwrap().unwrap()
    }

    #[test]
    fn test_keys_match_regardless_of_case() {
        assert_eq!(
            parse(r#"{"MethodConfig": [{"NAME": [{"Service": "pkg.Svc"}]}]}"#),
            json!({"methodConfig": [{"name": [{"service": "pkg.Svc"}]}]})
        );
    }

    #[test]
    fn test_unicode_folds() {
        assert_eq!(
            parse("{\"\u{17f}ervice\": \"a\"}"),
            json!({"service": "a"})
        );
    }

    #[test]
    fn test_last_folded_key_wins() {
        assert_eq!(
            parse(r#"{"service": "a", "SERVICE": "b"}"#),
            json!({"service": "b"})
        );
        assert_eq!(
            parse(r#"{"Service": "b", "service": "a"}"#),
            json!({"service": "a"})
        );
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        assert_eq!(
            parse(r#"{"Timeout": "1s", "methodconfig": []}"#),
            json!({"Timeout": "1s", "methodConfig": []})
        );
    }

    #[test]
    fn test_top_level_shape() {
        assert_eq!(parse_object(b"null", FIELDS).unwrap(), None);
        assert!(parse_object(b"42", FIELDS).is_err());
        assert!(parse_object(b"[]", FIELDS).is_err());
        assert!(parse_object(b"{", FIELDS).is_err());
    }
}
