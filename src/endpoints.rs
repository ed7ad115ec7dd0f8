//! Endpoint metadata: merge strategies, aggregation across a handler chain, and parameter lists.
//!
//! Endpoint trees are merged with strategies for the keys that carry structure:
//!
//! | key | strategy |
//! |---|---|
//! | `tags` | sequences are concatenated |
//! | `headers`, `path_params`, `query_string`, `form_data` | verified tree merge |
//! | `body` | verified tree merge; a bare reference token means `{schema: {"$ref": token}}` |
//! | `responses` | keys must be decimal status codes, then verified tree merge |
//!
//! [`endpoint_metadata`] combines controller-, path- and action-level fragments of every handler
//! in an inheritance chain, and [`build_parameter_metadata`] flattens the parameter categories into
//! the `parameters` sequence of the rendered operation.

use crate::camelize::{camelize, camelize_key, CamelizeOptions};
use crate::error::{Error, Result};
use crate::handler::MetadataSource;
use crate::merge::{merge, verify_and_merge, MergeOptions, MergeStrategy};
use crate::tree::{as_token, MetadataTree};
use log::debug;
use serde_json::{json, Value};

pub const ENDPOINT_STRATEGIES: &[(&str, MergeStrategy)] = &[
    ("tags", merge_tags),
    ("headers", merge_headers),
    ("path_params", merge_path_params),
    ("query_string", merge_query_string),
    ("form_data", merge_form_data),
    ("body", merge_body),
    ("responses", merge_responses),
];

/// Parameter categories in output order, with their `in` location.
const PARAMETER_CATEGORIES: &[(&str, &str)] = &[
    ("headers", "header"),
    ("path_params", "path"),
    ("query_string", "query"),
    ("form_data", "form_data"),
];

/// Merges endpoint metadata using the endpoint strategies. `children` is never merged.
pub fn merge_metadata(base: &mut MetadataTree, incoming: MetadataTree) -> Result<()> {
    merge_with(base, incoming, MergeOptions::with_strategies(ENDPOINT_STRATEGIES))
}

/// Merges a declaration into a handler store, keeping `null` values as tombstones.
pub fn declare_metadata(store: &mut MetadataTree, incoming: MetadataTree) -> Result<()> {
    merge_with(
        store,
        incoming,
        MergeOptions::with_strategies(ENDPOINT_STRATEGIES).keeping_tombstones(),
    )
}

fn merge_with(base: &mut MetadataTree, mut incoming: MetadataTree, opts: MergeOptions<'_>) -> Result<()> {
    incoming.shift_remove("children");
    merge(base, incoming, &opts)
}

fn merge_tags(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    let more = match incoming {
        Value::Null => return Ok(opts.tombstone()),
        Value::Array(more) => more,
        _ => return Err(Error::MergeType("tags as a sequence".to_string())),
    };
    let mut tags = match existing {
        Some(Value::Array(tags)) => tags,
        _ => Vec::new(),
    };
    tags.extend(more);
    Ok(Some(Value::Array(tags)))
}

fn merge_headers(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    verify_and_merge(existing, incoming, "header parameters", opts)
}

fn merge_path_params(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    verify_and_merge(existing, incoming, "path parameters", opts)
}

fn merge_query_string(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    verify_and_merge(existing, incoming, "query string parameters", opts)
}

fn merge_form_data(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    verify_and_merge(existing, incoming, "form data parameters", opts)
}

fn merge_body(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    let incoming = match as_token(&incoming) {
        Some(token) => json!({"schema": {"$ref": token}}),
        None => incoming,
    };
    verify_and_merge(existing, incoming, "body", opts)
}

fn merge_responses(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    if let Value::Object(responses) = &incoming {
        if let Some(code) = responses.keys().find(|code| !is_status_code(code)) {
            return Err(Error::InvalidResponseCode(code.clone()));
        }
    }
    verify_and_merge(existing, incoming, "responses", opts)
}

/// A decimal integer in canonical form ("200", not "0200" or "2xx").
fn is_status_code(code: &str) -> bool {
    code.parse::<u32>().is_ok_and(|n| n.to_string() == code)
}

/// Path relative to `base_path`, always starting with `/`.
pub fn relative_path(path: &str, base_path: &str) -> String {
    if path.is_empty() || base_path.is_empty() {
        return path.to_string();
    }
    let relative = path.strip_prefix(base_path).unwrap_or(path);
    if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("/{}", relative)
    }
}

/// Aggregated metadata for `action` at `path` across a handler chain.
///
/// `chain` lists the handler first and its root-most ancestor last. Each scope is aggregated
/// root-first so the most specific declaration wins and can tombstone inherited keys. Path-level
/// and action-level aggregates are combined with the action winning, and the result is layered
/// over the controller-level aggregate.
pub fn endpoint_metadata(chain: &[&dyn MetadataSource], action: &str, path: &str) -> Result<MetadataTree> {
    let mut controller = MetadataTree::new();
    let mut path_level = MetadataTree::new();
    let mut action_level = MetadataTree::new();

    for source in chain.iter().rev() {
        merge_metadata(&mut controller, source.controller_metadata())?;
        merge_metadata(&mut path_level, source.path_metadata(path)?)?;
        merge_metadata(&mut action_level, source.action_metadata(action)?)?;
    }

    merge_metadata(&mut path_level, action_level)?;
    merge_metadata(&mut controller, path_level)?;
    debug!(
        "Aggregated {} keys for action '{}' at {}",
        controller.len(),
        action,
        path
    );
    Ok(controller)
}

/// Replaces the parameter categories of `endpoint` with a flat `parameters` sequence.
///
/// Entries are ordered header, path, query, form data, then a single body entry. The key is
/// omitted entirely when no parameters remain.
pub fn build_parameter_metadata(endpoint: &mut MetadataTree) -> Result<()> {
    let mut parameters = Vec::new();
    for (category, location) in PARAMETER_CATEGORIES {
        if let Some(params) = endpoint.shift_remove(*category) {
            parameters.extend(param_array(params, location)?);
        }
    }
    if let Some(Value::Object(body)) = endpoint.shift_remove("body") {
        let mut wrapped = MetadataTree::new();
        wrapped.insert("body".to_string(), Value::Object(body));
        parameters.extend(param_array(Value::Object(wrapped), "body")?);
    }

    if parameters.is_empty() {
        endpoint.shift_remove("parameters");
    } else {
        endpoint.insert(
            "parameters".to_string(),
            camelize(&Value::Array(parameters), CamelizeOptions::to_depth(3)),
        );
    }
    Ok(())
}

fn param_array(params: Value, location: &str) -> Result<Vec<Value>> {
    let params = match params {
        Value::Null => return Ok(Vec::new()),
        Value::Object(params) => params,
        _ => {
            return Err(Error::MergeType(format!(
                "parameters of type '{}'",
                location
            )))
        }
    };
    Ok(params
        .into_iter()
        .map(|(name, attributes)| {
            let mut entry = MetadataTree::new();
            entry.insert("name".to_string(), Value::String(name));
            entry.insert("in".to_string(), Value::String(camelize_key(location)));
            match attributes {
                Value::Object(attributes) => entry.extend(
                    attributes
                        .into_iter()
                        .filter(|(key, _)| key != "name" && key != "in"),
                ),
                // shorthand: `page: integer`
                Value::String(type_name) => {
                    entry.insert("type".to_string(), Value::String(type_name));
                }
                _ => {}
            }
            Value::Object(entry)
        })
        .collect())
}
