//! Global configuration consumed by document generation.
//!
//! Configuration is itself a metadata tree. Besides the document-level fields copied to the
//! output (`swagger`, `info`, `schemes`, `host`, ...) it recognizes:
//!
//! - `base_paths`: a sequence of path prefixes, or a mapping from prefix to per-prefix options
//! - `output_file_path`: where [`crate::serializer::write_document`] writes by default
//! - `definitions`: schemas seeding every generated document's definitions table
//!
//! `base_paths` and `output_file_path` never reach the rendered document.

use crate::error::{Error, Result};
use crate::merge::{merge_value, MergeOptions};
use crate::tree::{from_yaml, MetadataTree};
use log::debug;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys consumed by generation and hidden from the rendered document
pub const HIDDEN_KEYS: &[&str] = &["base_paths", "output_file_path"];

#[derive(Debug, Clone)]
pub struct Config {
    metadata: MetadataTree,
}

impl Default for Config {
    fn default() -> Self {
        let metadata = json!({"swagger": 2.0, "schemes": ["http"]})
            .as_object()
            .cloned()
            .unwrap_or_default();
        Self { metadata }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges further settings over the current configuration.
    pub fn configure(&mut self, settings: Value) -> Result<()> {
        if !(settings.is_object() || settings.is_null()) {
            return Err(Error::ExpectedTreeArgument("configuration"));
        }
        let mut updated = self.metadata.clone();
        merge_value(&mut updated, settings, &MergeOptions::default())?;
        self.metadata = updated;
        Ok(())
    }

    /// Loads a configuration file, YAML or JSON by extension, over the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::default();
        config.configure(parse_document(path, &content)?)?;
        Ok(config)
    }

    pub fn metadata(&self) -> &MetadataTree {
        &self.metadata
    }

    pub fn base_paths(&self) -> Option<&Value> {
        self.metadata.get("base_paths").filter(|v| !v.is_null())
    }

    pub fn output_file_path(&self) -> Option<PathBuf> {
        match self.metadata.get("output_file_path") {
            Some(Value::String(path)) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            _ => None,
        }
    }

    pub fn definitions(&self) -> Option<&Value> {
        self.metadata.get("definitions")
    }

    /// Document-level fields, without the keys consumed by generation.
    pub fn document_fields(&self) -> MetadataTree {
        self.metadata
            .iter()
            .filter(|(key, _)| !HIDDEN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Parses a YAML or JSON document, choosing the format by file extension.
pub fn parse_document(path: &Path, content: &str) -> Result<Value> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(content)?)
    } else {
        let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
        Ok(from_yaml(yaml))
    }
}
