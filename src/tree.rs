//! Metadata trees: the ordered key/value structure every component exchanges.
//!
//! A tree is a `serde_json` object map built with the `preserve_order` feature, so keys keep
//! their insertion order from declaration through rendering. A bare string value stands in for
//! a reference token wherever a component interprets one (`schema`, `items`, `$ref`, `tags`).

use serde_json::Value;

/// An ordered mapping from key to value.
pub type MetadataTree = serde_json::Map<String, Value>;

/// Returns the reference token carried by `value`, if it is one.
pub fn as_token(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if is_name_token(s) => Some(s.as_str()),
        _ => None,
    }
}

/// A usable name is non-empty once surrounding whitespace is removed.
pub fn is_name_token(name: &str) -> bool {
    !name.trim().is_empty()
}

/// Canonical serialization used for content-based deduplication.
pub fn canonical_json(tree: &MetadataTree) -> String {
    // Map serialization of string keys and JSON values cannot fail
    serde_json::to_string(tree).unwrap_or_default()
}

/// Unwraps a tree value, treating `null` as absent.
///
/// Returns `Err(value)` when the value is present but not a tree so the caller can report the
/// failure with its own context.
pub fn into_tree(value: Value) -> std::result::Result<Option<MetadataTree>, Value> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(other),
    }
}

/// Renders a scalar as the string form a name lookup expects.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Converts a YAML document into a metadata value.
///
/// Mapping keys are rendered as strings, so `200:` and `"200":` name the same key. YAML tags are
/// dropped in favor of the tagged value.
pub fn from_yaml(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(items.into_iter().map(from_yaml).collect()),
        serde_yaml::Value::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (yaml_key(key), from_yaml(value)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match from_yaml(key) {
        Value::String(s) => s,
        Value::Null => "null".to_string(),
        other => scalar_to_string(&other).unwrap_or_else(|| other.to_string()),
    }
}
