//! Serialization module for rendering generated documents as YAML or JSON.
//!
//! This module provides functions to serialize documents into standard formats and write them
//! to files or return them as strings.

use crate::config::Config;
use crate::error::Error;
use crate::generator::Document;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a document to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &Document) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to JSON format with pretty printing.
///
/// The output is formatted with indentation for readability, making it suitable
/// for human review and version control.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &Document) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does. Parent directories are
/// created as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    write_file(content, path).with_context(|| format!("Failed to write to file: {}", path.display()))
}

fn write_file(content: &str, path: &Path) -> crate::error::Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Builds a document and writes it as pretty-printed JSON.
///
/// The destination is `target` when given, otherwise the configured `output_file_path`. A
/// missing destination fails with [`Error::MissingOutputTarget`] before `build` runs, so no
/// partial output is ever produced.
pub fn write_document<F>(config: &Config, target: Option<&Path>, build: F) -> crate::error::Result<Document>
where
    F: FnOnce() -> crate::error::Result<Document>,
{
    let path = target
        .map(Path::to_path_buf)
        .or_else(|| config.output_file_path())
        .ok_or(Error::MissingOutputTarget)?;

    let document = build()?;
    let content = serde_json::to_string_pretty(&document)?;
    write_file(&content, &path)?;
    Ok(document)
}
