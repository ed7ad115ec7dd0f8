//! Handler metadata stores and the registry that owns them.
//!
//! Each [`HandlerClass`] holds the fragments declared for one route handler: a controller-wide
//! tree, path-level trees keyed by literal path or pattern, action-level trees keyed by action
//! name, and named object and tag declarations. Handlers form a single-inheritance chain through
//! their `parent` name; the chain is an explicit list of override layers rather than anything tied
//! to the handler's own type hierarchy.
//!
//! Declarations go through a [`RegistryBuilder`]. Once every handler is declared,
//! [`RegistryBuilder::freeze`] produces a read-only [`Registry`] for document generation.

use crate::endpoints;
use crate::error::{Error, Result};
use crate::objects;
use crate::tags;
use crate::tree::{into_tree, is_name_token, scalar_to_string, MetadataTree};
use log::debug;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Read side of a handler's metadata, one layer of an inheritance chain.
pub trait MetadataSource {
    fn name(&self) -> &str;

    /// Controller-wide metadata shared by every endpoint of the handler
    fn controller_metadata(&self) -> MetadataTree;

    /// Merged metadata of every path entry matching `path`
    fn path_metadata(&self, path: &str) -> Result<MetadataTree>;

    /// Merged metadata of the entries declared for `action` (case-insensitive)
    fn action_metadata(&self, action: &str) -> Result<MetadataTree>;

    fn object_metadata(&self, name: &str) -> Option<MetadataTree>;

    fn tag_metadata(&self, name: &str) -> Option<MetadataTree>;
}

/// Discriminator of a path-level store entry
#[derive(Debug, Clone)]
pub enum PathKey {
    Literal(String),
    Pattern(Regex),
}

impl PathKey {
    pub fn literal(path: &str) -> Result<Self> {
        if !is_name_token(path) {
            return Err(Error::InvalidArgument("path"));
        }
        Ok(PathKey::Literal(path.to_string()))
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(PathKey::Pattern)
            .map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Pattern matching `:name` bounded by separators or an optional-segment suffix, or the
    /// `(.:name)` optional segment itself.
    pub fn path_param(name: &str) -> Result<Self> {
        if !is_name_token(name) {
            return Err(Error::InvalidArgument("path parameter"));
        }
        let name = regex::escape(name);
        Self::pattern(&format!(r"(^|/):{name}($|/|\()|\(\.:{name}\)"))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathKey::Literal(literal) => literal == path,
            PathKey::Pattern(regex) => regex.is_match(path),
        }
    }

    fn same_key(&self, other: &PathKey) -> bool {
        match (self, other) {
            (PathKey::Literal(a), PathKey::Literal(b)) => a == b,
            (PathKey::Pattern(a), PathKey::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// Metadata stores declared for one handler
#[derive(Debug, Clone, Default)]
pub struct HandlerClass {
    name: String,
    parent: Option<String>,
    controller: MetadataTree,
    paths: Vec<(PathKey, MetadataTree)>,
    actions: HashMap<String, MetadataTree>,
    objects: HashMap<String, MetadataTree>,
    tags: HashMap<String, MetadataTree>,
}

impl HandlerClass {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn set_parent(&mut self, parent: Option<&str>) {
        self.parent = parent.map(str::to_string);
    }

    pub fn declare_controller_metadata(&mut self, metadata: Value) -> Result<()> {
        let Some(metadata) = expect_tree(metadata, "controller metadata")? else {
            return Ok(());
        };
        let mut updated = self.controller.clone();
        endpoints::declare_metadata(&mut updated, metadata)?;
        self.controller = updated;
        Ok(())
    }

    pub fn declare_path_metadata(&mut self, key: PathKey, metadata: Value) -> Result<()> {
        let Some(metadata) = expect_tree(metadata, "path metadata")? else {
            return Ok(());
        };
        match self.paths.iter_mut().find(|(existing, _)| existing.same_key(&key)) {
            Some((_, existing)) => {
                let mut updated = existing.clone();
                endpoints::declare_metadata(&mut updated, metadata)?;
                *existing = updated;
            }
            None => {
                let mut created = MetadataTree::new();
                endpoints::declare_metadata(&mut created, metadata)?;
                self.paths.push((key, created));
            }
        }
        Ok(())
    }

    /// Documents a path parameter for every path mentioning `:name`.
    ///
    /// Defaults to `{type: integer, required: true}`; `metadata` overrides either attribute.
    pub fn declare_path_param(&mut self, name: &str, metadata: Value) -> Result<()> {
        let key = PathKey::path_param(name)?;
        let mut param = json!({"type": "integer", "required": true})
            .as_object()
            .cloned()
            .unwrap_or_default();
        if let Some(overrides) = expect_tree(metadata, "path parameter metadata")? {
            param.extend(overrides);
        }
        debug!("Declaring path parameter '{}' on {}", name, self.name);
        self.declare_path_metadata(key, json!({"path_params": {name: param}}))
    }

    pub fn declare_action_metadata(&mut self, action: &str, metadata: Value) -> Result<()> {
        if !is_name_token(action) {
            return Err(Error::InvalidArgument("action"));
        }
        let Some(metadata) = expect_tree(metadata, "action metadata")? else {
            return Ok(());
        };
        let mut updated = self
            .actions
            .get(&action.to_lowercase())
            .cloned()
            .unwrap_or_default();
        endpoints::declare_metadata(&mut updated, metadata)?;
        self.actions.insert(action.to_lowercase(), updated);
        Ok(())
    }

    /// Declares a named schema, expanding shorthand property types first.
    pub fn declare_object(&mut self, name: &str, metadata: Value) -> Result<()> {
        if !is_name_token(name) {
            return Err(Error::InvalidArgument("object"));
        }
        let Some(metadata) = expect_tree(metadata, "object metadata")? else {
            return Ok(());
        };
        let expanded = objects::expand_object(metadata);
        let mut updated = self.objects.get(name).cloned().unwrap_or_default();
        objects::declare_metadata(&mut updated, expanded)?;
        self.objects.insert(name.to_string(), updated);
        Ok(())
    }

    pub fn declare_objects(&mut self, objects: Value) -> Result<()> {
        let Some(objects) = expect_tree(objects, "objects")? else {
            return Ok(());
        };
        for (name, metadata) in objects {
            self.declare_object(&name, metadata)?;
        }
        Ok(())
    }

    /// Declares a tag; the tag's `name` defaults to the declared name.
    pub fn declare_tag(&mut self, name: &str, metadata: Value) -> Result<()> {
        if !is_name_token(name) {
            return Err(Error::InvalidArgument("tag"));
        }
        let Some(metadata) = expect_tree(metadata, "tag metadata")? else {
            return Ok(());
        };
        let mut updated = self.tags.get(name).cloned().unwrap_or_default();
        tags::declare_metadata(&mut updated, with_name(name, metadata))?;
        self.tags.insert(name.to_string(), updated);
        Ok(())
    }

    pub fn declare_tags(&mut self, tags: Value) -> Result<()> {
        let Some(tags) = expect_tree(tags, "tags")? else {
            return Ok(());
        };
        for (name, metadata) in tags {
            self.declare_tag(&name, metadata)?;
        }
        Ok(())
    }
}

impl MetadataSource for HandlerClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn controller_metadata(&self) -> MetadataTree {
        self.controller.clone()
    }

    fn path_metadata(&self, path: &str) -> Result<MetadataTree> {
        if !is_name_token(path) {
            return Err(Error::InvalidArgument("path"));
        }
        let mut result = MetadataTree::new();
        for (key, metadata) in &self.paths {
            if key.matches(path) {
                endpoints::declare_metadata(&mut result, metadata.clone())?;
            }
        }
        Ok(result)
    }

    fn action_metadata(&self, action: &str) -> Result<MetadataTree> {
        if !is_name_token(action) {
            return Err(Error::InvalidArgument("action"));
        }
        Ok(self
            .actions
            .get(&action.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    fn object_metadata(&self, name: &str) -> Option<MetadataTree> {
        self.objects.get(name).cloned()
    }

    fn tag_metadata(&self, name: &str) -> Option<MetadataTree> {
        self.tags.get(name).cloned()
    }
}

/// Mutable registry used while handlers declare their metadata
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, HandlerClass>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler named `name`, creating it on first use.
    ///
    /// A `Some` parent replaces any previously recorded parent.
    pub fn handler(&mut self, name: &str, parent: Option<&str>) -> &mut HandlerClass {
        let handler = self
            .handlers
            .entry(name.to_string())
            .or_insert_with(|| HandlerClass::new(name));
        if parent.is_some() {
            handler.set_parent(parent);
        }
        handler
    }

    pub fn freeze(self) -> Registry {
        debug!("Freezing metadata registry with {} handlers", self.handlers.len());
        Registry {
            handlers: self.handlers,
        }
    }
}

/// Read-only registry consulted during document generation
#[derive(Debug, Default)]
pub struct Registry {
    handlers: HashMap<String, HandlerClass>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&HandlerClass> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Inheritance chain of `name`, the handler itself first and the root-most ancestor last.
    ///
    /// Walking stops at the first ancestor that is not registered, and on a repeated name.
    pub fn hierarchy(&self, name: &str) -> Vec<&dyn MetadataSource> {
        let mut chain: Vec<&dyn MetadataSource> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.handlers.get(name);
        while let Some(handler) = current {
            if !seen.insert(handler.name.as_str()) {
                break;
            }
            chain.push(handler);
            current = handler.parent().and_then(|parent| self.handlers.get(parent));
        }
        chain
    }
}

fn expect_tree(value: Value, what: &'static str) -> Result<Option<MetadataTree>> {
    into_tree(value).map_err(|_| Error::ExpectedTreeArgument(what))
}

fn with_name(name: &str, mut metadata: MetadataTree) -> MetadataTree {
    match metadata.get("name").and_then(scalar_to_string) {
        Some(_) => metadata,
        None => {
            let mut named = MetadataTree::new();
            named.insert("name".to_string(), Value::String(name.to_string()));
            named.append(&mut metadata);
            named
        }
    }
}
