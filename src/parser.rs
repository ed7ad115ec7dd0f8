use crate::config::parse_document;
use crate::error::Error;
use crate::handler::{PathKey, RegistryBuilder};
use crate::routes::Route;
use crate::tree::into_tree;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Parser for handler declaration files.
///
/// A declaration file is a YAML or JSON document holding one handler declaration, or a sequence
/// of them. Each declaration describes the metadata a route handler contributes:
///
/// ```yaml
/// name: BooksController
/// parent: BaseController
/// controller:
///   tags: [{name: Books}]
/// paths:
///   - path: /books
///     metadata: {description: Book collection}
///   - pattern: "^/books/:book_id"
///     metadata: {headers: {X-Book-Version: string}}
/// path_params:
///   book_id: {description: Book identifier}
/// actions:
///   index:
///     responses: {200: {schema: book_list}}
/// objects:
///   book_payload: {id: integer, name: string}
/// tags:
///   Books: {description: All the books}
/// ```
///
/// # Example
///
/// ```no_run
/// use openapi_from_metadata::handler::RegistryBuilder;
/// use openapi_from_metadata::parser::DeclarationParser;
/// use std::path::Path;
///
/// let parsed = DeclarationParser::parse_file(Path::new("handlers/books.yml")).unwrap();
/// let mut builder = RegistryBuilder::new();
/// parsed.apply(&mut builder).unwrap();
/// let registry = builder.freeze();
/// println!("Registered {} handlers", registry.len());
/// ```
pub struct DeclarationParser;

/// Handler declarations read from one file.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the declaration file
    pub path: PathBuf,
    /// Declarations in file order
    pub handlers: Vec<HandlerDeclaration>,
}

/// Metadata declared for one handler.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerDeclaration {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub controller: Value,
    #[serde(default)]
    pub paths: Vec<PathDeclaration>,
    #[serde(default)]
    pub path_params: Value,
    #[serde(default)]
    pub actions: Value,
    #[serde(default)]
    pub objects: Value,
    #[serde(default)]
    pub tags: Value,
}

/// A path-level entry, keyed by either a literal `path` or a `pattern`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathDeclaration {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeclarationDocument {
    Many(Vec<HandlerDeclaration>),
    One(HandlerDeclaration),
}

impl DeclarationParser {
    /// Parses a single declaration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a `.yml`, `.yaml` or `.json` declaration file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file is not valid YAML or JSON
    /// - The document does not have the shape of a handler declaration
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing declaration file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let handlers = Self::parse_str(path, &content)
            .with_context(|| format!("Failed to parse declarations in file: {}", path.display()))?;

        debug!("Parsed {} handler declarations from {}", handlers.len(), path.display());
        Ok(ParsedFile {
            path: path.to_path_buf(),
            handlers,
        })
    }

    /// Parses declaration content; `path` only selects the format.
    pub fn parse_str(path: &Path, content: &str) -> Result<Vec<HandlerDeclaration>> {
        let document = parse_document(path, content)?;
        if document.is_null() {
            return Ok(Vec::new());
        }
        let handlers = match serde_json::from_value(document)? {
            DeclarationDocument::Many(handlers) => handlers,
            DeclarationDocument::One(handler) => vec![handler],
        };
        Ok(handlers)
    }

    /// Parses multiple declaration files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings and returned as errors in their slot, so
    /// one broken file does not keep the remaining handlers from being documented.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} declaration files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                let result = Self::parse_file(path);
                if let Err(ref e) = result {
                    warn!("Failed to parse {}: {:#}", path.display(), e);
                }
                result
            })
            .collect();

        let ok = results.iter().filter(|r| r.is_ok()).count();
        debug!("Parsed {} of {} declaration files", ok, paths.len());
        results
    }

    /// Reads the route table, a sequence of `{verb, path, handler, action, name?}` entries.
    pub fn parse_routes(path: &Path) -> Result<Vec<Route>> {
        debug!("Parsing route table: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route table: {}", path.display()))?;
        let document = parse_document(path, &content)
            .with_context(|| format!("Failed to parse route table: {}", path.display()))?;
        if document.is_null() {
            return Ok(Vec::new());
        }
        let routes: Vec<Route> = serde_json::from_value(document)
            .with_context(|| format!("Invalid route entry in {}", path.display()))?;
        debug!("Read {} routes", routes.len());
        Ok(routes)
    }
}

impl ParsedFile {
    /// Declares every handler of the file on `builder`.
    pub fn apply(&self, builder: &mut RegistryBuilder) -> Result<()> {
        for handler in &self.handlers {
            handler.clone().apply(builder).with_context(|| {
                format!(
                    "Invalid declaration for handler '{}' in {}",
                    handler.name,
                    self.path.display()
                )
            })?;
        }
        Ok(())
    }
}

impl HandlerDeclaration {
    /// Declares this handler's metadata on `builder`.
    ///
    /// Stops at the first declaration that fails; earlier declarations stay in place.
    pub fn apply(self, builder: &mut RegistryBuilder) -> crate::error::Result<()> {
        let handler = builder.handler(&self.name, self.parent.as_deref());
        handler.declare_controller_metadata(self.controller)?;

        for entry in self.paths {
            let key = match (entry.path, entry.pattern) {
                (Some(path), None) => PathKey::literal(&path)?,
                (None, Some(pattern)) => PathKey::pattern(&pattern)?,
                _ => return Err(Error::InvalidArgument("path")),
            };
            handler.declare_path_metadata(key, entry.metadata)?;
        }

        let path_params = into_tree(self.path_params)
            .map_err(|_| Error::ExpectedTreeArgument("path parameters"))?
            .unwrap_or_default();
        for (name, metadata) in path_params {
            handler.declare_path_param(&name, metadata)?;
        }

        let actions = into_tree(self.actions)
            .map_err(|_| Error::ExpectedTreeArgument("actions"))?
            .unwrap_or_default();
        for (action, metadata) in actions {
            handler.declare_action_metadata(&action, metadata)?;
        }

        handler.declare_objects(self.objects)?;
        handler.declare_tags(self.tags)?;
        Ok(())
    }
}
