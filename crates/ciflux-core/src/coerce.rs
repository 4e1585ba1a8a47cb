//! Total conversions from loosely-typed document values into the string shapes
//! the canonical model needs.
//!
//! None of these functions fail. A value that does not fit the requested shape
//! yields `None` (or an empty collection) and the caller picks the fallback.

use indexmap::IndexMap;
use serde_yaml::Value;

/// Render a scalar as a string. Sequences yield their first string element.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(seq) => seq.iter().find_map(|v| v.as_str().map(String::from)),
        Value::Null | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Like [`as_string`], falling back to `default` when the value has no string form.
pub fn string_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(as_string)
        .unwrap_or_else(|| default.to_string())
}

/// Render a scalar or a sequence of scalars as a list of strings.
///
/// A single scalar becomes a one-element list. Non-scalar sequence items are
/// skipped. Null and mappings have no list form.
pub fn as_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Number(n) => Some(vec![n.to_string()]),
        Value::Bool(b) => Some(vec![b.to_string()]),
        Value::Sequence(seq) => Some(seq.iter().filter_map(scalar_to_string).collect()),
        Value::Null | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// [`as_string_list`] for an optional value, empty when absent or not list-like.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    value.and_then(as_string_list).unwrap_or_default()
}

/// Keep every entry of a mapping whose value renders as a non-empty string.
///
/// Anything that is not a mapping yields an empty map.
pub fn string_map(value: Option<&Value>) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    if let Some(Value::Mapping(mapping)) = value {
        for (k, v) in mapping {
            let Some(key) = scalar_to_string(k) else {
                continue;
            };
            match as_string(v) {
                Some(val) if !val.is_empty() => {
                    map.insert(key, val);
                }
                _ => {}
            }
        }
    }
    map
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_as_string_scalars() {
        assert_eq!(as_string(&yaml("alpine")), Some("alpine".to_string()));
        assert_eq!(as_string(&yaml("42")), Some("42".to_string()));
        assert_eq!(as_string(&yaml("1.5")), Some("1.5".to_string()));
        assert_eq!(as_string(&yaml("true")), Some("true".to_string()));
        assert_eq!(as_string(&Value::Null), None);
    }

    #[test]
    fn test_as_string_takes_first_string_of_sequence() {
        assert_eq!(as_string(&yaml("[1, debian, alpine]")), Some("debian".to_string()));
        assert_eq!(as_string(&yaml("[1, 2]")), None);
        assert_eq!(as_string(&yaml("{name: x}")), None);
    }

    #[test]
    fn test_string_or_uses_default() {
        assert_eq!(string_or(None, "test"), "test");
        assert_eq!(string_or(Some(&yaml("{a: b}")), "test"), "test");
        assert_eq!(string_or(Some(&yaml("build")), "test"), "build");
    }

    #[test]
    fn test_string_list_shapes() {
        assert_eq!(string_list(Some(&yaml("make"))), vec!["make"]);
        assert_eq!(
            string_list(Some(&yaml("[make, 3, false, {x: y}, [nested]]"))),
            vec!["make", "3", "false"]
        );
        assert!(string_list(Some(&yaml("{script: make}"))).is_empty());
        assert!(string_list(None).is_empty());
    }

    #[test]
    fn test_string_map_drops_uncoercible_values() {
        let map = string_map(Some(&yaml(
            "{A: one, B: 2, C: ~, D: {x: y}, E: '', F: [first, second], 7: seven}",
        )));
        let entries: Vec<(&str, &str)> =
            map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            entries,
            vec![("A", "one"), ("B", "2"), ("F", "first"), ("7", "seven")]
        );
        assert!(string_map(Some(&yaml("[a, b]"))).is_empty());
    }
}
