//! Tag declarations and resolution of endpoint tag references into the document's tag list.

use crate::error::{Error, Result};
use crate::handler::MetadataSource;
use crate::merge::{merge, MergeOptions};
use crate::tree::{canonical_json, scalar_to_string, MetadataTree};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

pub fn merge_metadata(base: &mut MetadataTree, incoming: MetadataTree) -> Result<()> {
    merge(base, incoming, &MergeOptions::recursive())
}

/// Merges a declaration into a handler's tag store, keeping `null` values as tombstones.
pub fn declare_metadata(store: &mut MetadataTree, incoming: MetadataTree) -> Result<()> {
    merge(store, incoming, &MergeOptions::recursive().keeping_tombstones())
}

/// Generation-scoped table of resolved tags, deduplicated by content.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    entries: MetadataTree,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `metadata` under `name` and returns the name it was stored under.
    ///
    /// A content conflict stores the tag as `name (1)`, `name (2)`, ... with its `name` field
    /// rewritten to match.
    pub fn add(&mut self, name: &str, metadata: MetadataTree) -> String {
        let mut candidate = name.to_string();
        let mut retry = 0;
        loop {
            let tagged = named(&candidate, metadata.clone());
            match self.entries.get(&candidate) {
                Some(Value::Object(existing)) if canonical_json(existing) == canonical_json(&tagged) => {
                    return candidate;
                }
                Some(_) => {
                    retry += 1;
                    candidate = format!("{} ({})", name, retry);
                }
                None => {
                    self.entries.insert(candidate.clone(), Value::Object(tagged));
                    return candidate;
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved tags in registration order
    pub fn values(&self) -> Vec<Value> {
        self.entries.values().cloned().collect()
    }
}

fn named(name: &str, mut metadata: MetadataTree) -> MetadataTree {
    if metadata.contains_key("name") {
        metadata.insert("name".to_string(), Value::String(name.to_string()));
        metadata
    } else {
        let mut tagged = MetadataTree::new();
        tagged.insert("name".to_string(), Value::String(name.to_string()));
        tagged.append(&mut metadata);
        tagged
    }
}

/// Defines and looks up tags on behalf of one handler.
pub trait TagSource {
    /// Records an inline tag definition.
    ///
    /// A returned tree is registered in the tag table as is.
    fn define_tag(&mut self, name: &str, metadata: MetadataTree) -> Result<Option<Value>>;

    /// Aggregated metadata of the named tag, `None` when nothing declares it
    fn resolve_tag(&self, name: &str) -> Option<Value>;
}

/// Inline tag definitions made during one generation, keyed by handler name.
///
/// Handler stores are frozen by then, so these layer over each handler's declared tags.
#[derive(Debug, Default)]
pub struct TagDefinitions {
    handlers: HashMap<String, HashMap<String, MetadataTree>>,
}

impl TagDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, handler: &str, tag: &str) -> Option<&MetadataTree> {
        self.handlers.get(handler).and_then(|tags| tags.get(tag))
    }
}

/// Tag lookup through a handler's inheritance chain and the generation's inline definitions
pub struct HandlerTags<'a> {
    chain: &'a [&'a dyn MetadataSource],
    definitions: &'a mut TagDefinitions,
}

impl<'a> HandlerTags<'a> {
    pub fn new(chain: &'a [&'a dyn MetadataSource], definitions: &'a mut TagDefinitions) -> Self {
        Self { chain, definitions }
    }
}

impl TagSource for HandlerTags<'_> {
    fn define_tag(&mut self, name: &str, metadata: MetadataTree) -> Result<Option<Value>> {
        let Some(handler) = self.chain.first() else {
            return Ok(None);
        };
        let store = self
            .definitions
            .handlers
            .entry(handler.name().to_string())
            .or_default()
            .entry(name.to_string())
            .or_default();
        let mut updated = store.clone();
        declare_metadata(&mut updated, metadata)?;
        *store = updated;
        Ok(None)
    }

    fn resolve_tag(&self, name: &str) -> Option<Value> {
        let mut declared = false;
        let mut aggregate = MetadataTree::new();
        for source in self.chain.iter().rev() {
            let layers = [
                source.tag_metadata(name),
                self.definitions.get(source.name(), name).cloned(),
            ];
            for metadata in layers.into_iter().flatten() {
                declared = true;
                if let Err(err) = merge_metadata(&mut aggregate, metadata) {
                    debug!("Skipping tag '{}' from {}: {}", name, source.name(), err);
                }
            }
        }
        declared.then_some(Value::Object(aggregate))
    }
}

/// Rewrites the endpoint's `tag`/`tags` entries as `tags: [resolved names]`.
///
/// Tree entries are defined before being resolved and are dropped when they carry no `name`.
/// The key is removed when no names remain.
pub fn resolve_refs(endpoint: &mut MetadataTree, table: &mut TagTable, source: &mut dyn TagSource) -> Result<()> {
    let mut entries = Vec::new();
    let mut found = false;
    for key in ["tag", "tags"] {
        match endpoint.shift_remove(key) {
            Some(Value::Array(values)) if key == "tags" => {
                found = true;
                entries.extend(values);
            }
            Some(Value::Null) | None => {}
            Some(value) if key == "tag" => {
                found = true;
                entries.push(value);
            }
            Some(value) => {
                // A non-sequence `tags` value is left as authored
                endpoint.insert(key.to_string(), value);
            }
        }
    }
    if !found {
        return Ok(());
    }

    let mut names = Vec::new();
    for entry in entries {
        let name = match entry {
            Value::Object(metadata) => {
                let Some(name) = metadata.get("name").and_then(scalar_to_string) else {
                    continue;
                };
                let metadata = named(&name, metadata);
                match source.define_tag(&name, metadata)? {
                    None | Some(Value::Null) => {}
                    Some(Value::Object(defined)) => {
                        table.add(&name, defined);
                    }
                    Some(_) => return Err(Error::ExpectedTreeFromDefiner(name)),
                }
                name
            }
            other => match scalar_to_string(&other) {
                Some(name) if !name.trim().is_empty() => name,
                _ => continue,
            },
        };

        let metadata = match source.resolve_tag(&name) {
            Some(Value::Object(metadata)) => metadata,
            None | Some(Value::Null) => MetadataTree::new(),
            Some(_) => {
                return Err(Error::ExpectedTreeFromResolver { kind: "tag", name });
            }
        };
        let registered = table.add(&name, metadata);
        if !names.contains(&registered) {
            names.push(registered);
        }
    }

    if !names.is_empty() {
        endpoint.insert(
            "tags".to_string(),
            Value::Array(names.into_iter().map(Value::String).collect()),
        );
    }
    Ok(())
}
