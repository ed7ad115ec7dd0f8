//! Depth-bounded key casing applied just before rendering.
//!
//! Depth is counted from the call site: the keys of the value passed in sit at depth 1, the keys
//! of a tree stored under one of them sit at depth 2, and so on. Sequences count as a level, so
//! the keys of trees inside a top-level sequence sit at depth 2. Keys are converted to
//! lower-camel-case only when `start_depth <= depth <= end_depth`.

use crate::tree::MetadataTree;
use convert_case::{Case, Casing};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct CamelizeOptions {
    /// First depth whose keys are transformed; shallower keys pass through untouched
    pub start_depth: usize,
    /// Last depth whose keys are transformed; deeper values are returned as-is
    pub end_depth: Option<usize>,
}

impl Default for CamelizeOptions {
    fn default() -> Self {
        Self {
            start_depth: 1,
            end_depth: None,
        }
    }
}

impl CamelizeOptions {
    pub fn to_depth(end_depth: usize) -> Self {
        Self {
            start_depth: 1,
            end_depth: Some(end_depth),
        }
    }

    pub fn between(start_depth: usize, end_depth: usize) -> Self {
        Self {
            start_depth,
            end_depth: Some(end_depth),
        }
    }
}

/// Returns a copy of `value` with keys camel-cased within the configured depth window.
pub fn camelize(value: &Value, opts: CamelizeOptions) -> Value {
    walk(value, 1, &opts)
}

pub fn camelize_tree(tree: &MetadataTree, opts: CamelizeOptions) -> MetadataTree {
    walk_tree(tree, 1, &opts)
}

/// Converts a single key to lower camel case.
///
/// Keys containing anything besides ASCII letters, digits and underscores (`$ref`,
/// `application/json`, `x-rate-limit`) and purely numeric keys (status codes) are kept verbatim.
pub fn camelize_key(key: &str) -> String {
    let plain = key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let has_letter = key.chars().any(|c| c.is_ascii_alphabetic());
    if plain && has_letter {
        key.to_case(Case::Camel)
    } else {
        key.to_string()
    }
}

fn walk(value: &Value, depth: usize, opts: &CamelizeOptions) -> Value {
    if opts.end_depth.is_some_and(|end| depth > end) {
        return value.clone();
    }
    match value {
        Value::Object(tree) => Value::Object(walk_tree(tree, depth, opts)),
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, depth + 1, opts)).collect()),
        scalar => scalar.clone(),
    }
}

fn walk_tree(tree: &MetadataTree, depth: usize, opts: &CamelizeOptions) -> MetadataTree {
    if opts.end_depth.is_some_and(|end| depth > end) {
        return tree.clone();
    }
    tree.iter()
        .map(|(key, value)| {
            let key = if depth >= opts.start_depth {
                camelize_key(key)
            } else {
                key.clone()
            };
            (key, walk(value, depth + 1, opts))
        })
        .collect()
}
