//! Document generation: walks the route table and assembles the API description.
//!
//! For every configured base path, routes under that prefix are matched to their handler, the
//! handler chain's metadata is aggregated into an operation, schema and tag references are
//! resolved into the document-wide tables, and the operation is stored under its rendered path
//! and verb. Unresolvable handlers and duplicate verb/path registrations are reported as
//! [`RouteWarning`]s and skipped; any other failure aborts the whole build.

use crate::camelize::{camelize, camelize_tree, CamelizeOptions};
use crate::config::Config;
use crate::endpoints::{build_parameter_metadata, endpoint_metadata, relative_path};
use crate::error::{Error, Result};
use crate::handler::{MetadataSource, Registry};
use crate::objects::{ChainObjects, DefinitionTable, SchemaResolver};
use crate::routes::{PathFilter, Route};
use crate::tags::{self, HandlerTags, TagDefinitions, TagTable};
use crate::tree::{scalar_to_string, MetadataTree};
use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Options applying to the routes under one base path
#[derive(Debug, Default)]
pub struct BasePathOptions {
    /// Overrides the generation-wide path filter for this base path
    pub path_filter: Option<PathFilter>,
}

impl BasePathOptions {
    fn from_value(base_path: &str, value: &Value) -> Result<Self> {
        let options = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(options) => options,
            _ => {
                return Err(Error::InvalidBasePaths(format!(
                    "expected options tree for base path '{}'",
                    base_path
                )))
            }
        };
        let path_filter = match options.get("path_filter") {
            None | Some(Value::Null) => None,
            Some(Value::String(path)) => Some(PathFilter::exact(path)),
            Some(Value::Array(paths)) => Some(PathFilter::set(paths.iter().filter_map(scalar_to_string))),
            Some(Value::Object(filter)) => match filter.get("pattern").and_then(Value::as_str) {
                Some(pattern) => Some(PathFilter::pattern(pattern)?),
                None => {
                    return Err(Error::InvalidBasePaths(format!(
                        "path filter for base path '{}' needs a 'pattern'",
                        base_path
                    )))
                }
            },
            Some(_) => {
                return Err(Error::InvalidBasePaths(format!(
                    "unsupported path filter for base path '{}'",
                    base_path
                )))
            }
        };
        Ok(Self { path_filter })
    }
}

/// Normalized base paths, in configuration order.
///
/// Every path starts with `/`; blank and repeated paths are dropped.
#[derive(Debug, Default)]
pub struct BasePaths {
    entries: Vec<(String, BasePathOptions)>,
}

impl BasePaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut base_paths = Self::default();
        for path in paths {
            base_paths.insert(path.as_ref(), BasePathOptions::default());
        }
        base_paths
    }

    /// Reads the sequence or mapping form of the `base_paths` setting.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut base_paths = Self::default();
        match value {
            Value::Array(paths) => {
                for path in paths.iter().filter_map(scalar_to_string) {
                    base_paths.insert(&path, BasePathOptions::default());
                }
            }
            Value::Object(paths) => {
                for (path, options) in paths {
                    base_paths.insert(path, BasePathOptions::from_value(path, options)?);
                }
            }
            _ => {
                return Err(Error::InvalidBasePaths(
                    "expected a sequence or a mapping".to_string(),
                ))
            }
        }
        Ok(base_paths)
    }

    pub fn insert(&mut self, path: &str, options: BasePathOptions) {
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        if !self.entries.iter().any(|(existing, _)| *existing == path) {
            self.entries.push((path, options));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BasePathOptions)> {
        self.entries.iter().map(|(path, options)| (path.as_str(), options))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn common_base_path(&self) -> Option<String> {
        let paths: Vec<&str> = self.entries.iter().map(|(path, _)| path.as_str()).collect();
        common_base_path(&paths)
    }
}

/// Longest run of leading path segments shared by every path.
///
/// A single path yields itself; paths with no segment in common yield `/`.
pub fn common_base_path(paths: &[&str]) -> Option<String> {
    let split: Vec<Vec<&str>> = paths
        .iter()
        .map(|path| path.split('/').filter(|s| !s.trim().is_empty()).collect())
        .collect();
    let (first, rest) = split.split_first()?;
    let common = (0..first.len())
        .take_while(|&i| rest.iter().all(|other| other.get(i) == Some(&first[i])))
        .count();
    Some(format!("/{}", first[..common].join("/")))
}

/// Options for one generation run
#[derive(Debug, Default)]
pub struct GenerateOptions {
    /// Replaces the configured `base_paths`
    pub base_paths: Option<BasePaths>,
    /// Applies to every base path without its own filter
    pub path_filter: Option<PathFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnresolvedHandler,
    DuplicateRoute,
}

/// A route skipped during generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteWarning {
    pub kind: WarningKind,
    pub message: String,
}

/// A generated API description
#[derive(Debug, Clone)]
pub struct Document {
    root: MetadataTree,
    warnings: Vec<RouteWarning>,
}

impl Document {
    pub fn root(&self) -> &MetadataTree {
        &self.root
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn warnings(&self) -> &[RouteWarning] {
        &self.warnings
    }

    pub fn into_tree(self) -> MetadataTree {
        self.root
    }
}

impl From<MetadataTree> for Document {
    fn from(root: MetadataTree) -> Self {
        Self {
            root,
            warnings: Vec::new(),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

/// Builds documents from a frozen registry and a route table.
pub struct Generator<'a> {
    config: &'a Config,
    registry: &'a Registry,
    routes: &'a [Route],
}

/// Tables shared by every endpoint of one build
#[derive(Default)]
struct EndpointContent {
    paths: MetadataTree,
    definitions: DefinitionTable,
    tags: TagTable,
    tag_definitions: TagDefinitions,
    warnings: Vec<RouteWarning>,
}

impl EndpointContent {
    fn warn(&mut self, kind: WarningKind, message: String) {
        warn!("{}", message);
        self.warnings.push(RouteWarning { kind, message });
    }
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a Config, registry: &'a Registry, routes: &'a [Route]) -> Self {
        Self {
            config,
            registry,
            routes,
        }
    }

    pub fn build(&self, options: GenerateOptions) -> Result<Document> {
        let base_paths = match options.base_paths {
            Some(base_paths) => base_paths,
            None => match self.config.base_paths() {
                Some(value) => BasePaths::from_value(value)?,
                None => return Err(Error::MissingBasePaths),
            },
        };
        if base_paths.is_empty() {
            return Err(Error::MissingBasePaths);
        }
        let common_base_path = base_paths.common_base_path().unwrap_or_else(|| "/".to_string());
        debug!("Common base path: {}", common_base_path);

        let mut content = EndpointContent::default();
        if let Some(seed) = self.config.definitions() {
            content.definitions = DefinitionTable::from_value(seed.clone())?;
        }

        for (base_path, base_options) in base_paths.iter() {
            let filter = base_options
                .path_filter
                .as_ref()
                .or(options.path_filter.as_ref());
            for route in self.routes.iter().filter(|r| r.path.starts_with(base_path)) {
                let relative = relative_path(&route.path, base_path);
                if filter.is_some_and(|f| !f.matches(&relative, route)) {
                    debug!("Filtered out {}", route.describe());
                    continue;
                }
                self.add_endpoint(route, &relative, &common_base_path, &mut content)?;
            }
        }

        info!(
            "Generated {} paths, {} definitions, {} tags",
            content.paths.len(),
            content.definitions.len(),
            content.tags.len()
        );
        Ok(self.assemble(content))
    }

    fn add_endpoint(
        &self,
        route: &Route,
        relative: &str,
        common_base_path: &str,
        content: &mut EndpointContent,
    ) -> Result<()> {
        let chain: Vec<&dyn MetadataSource> = self.registry.hierarchy(&route.handler);
        if chain.is_empty() {
            content.warn(
                WarningKind::UnresolvedHandler,
                format!("Can't resolve handler '{}' for route {}", route.handler, route.describe()),
            );
            return Ok(());
        }

        let mut endpoint = endpoint_metadata(&chain, &route.action, relative)?;
        match endpoint.shift_remove("hidden") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {}
            Some(_) => {
                debug!("Skipping hidden endpoint {}", route.describe());
                return Ok(());
            }
        }

        let path = route.rendered_path(common_base_path)?;
        let verb = route.verb.key();
        if content.paths.get(&path).and_then(|p| p.get(verb)).is_some() {
            content.warn(
                WarningKind::DuplicateRoute,
                format!(
                    "Multiple endpoints match {} {}; skipping route {}",
                    route.verb,
                    path,
                    route.describe()
                ),
            );
            return Ok(());
        }

        build_parameter_metadata(&mut endpoint)?;
        let objects = ChainObjects::new(&chain);
        let mut endpoint = SchemaResolver::new(&objects).resolve_tree(&endpoint, &mut content.definitions)?;
        let mut tag_source = HandlerTags::new(&chain, &mut content.tag_definitions);
        tags::resolve_refs(&mut endpoint, &mut content.tags, &mut tag_source)?;

        debug!("Documented {} {} from {}", route.verb, path, route.describe());
        let operations = content
            .paths
            .entry(path)
            .or_insert_with(|| Value::Object(MetadataTree::new()));
        if let Value::Object(operations) = operations {
            operations.insert(verb.to_string(), Value::Object(endpoint));
        }
        Ok(())
    }

    fn assemble(&self, content: EndpointContent) -> Document {
        let mut root = self.config.document_fields();
        root.shift_remove("definitions");

        if let Some(Value::Object(info)) = root.get("info") {
            let info = camelize_tree(info, CamelizeOptions::to_depth(1));
            root.insert("info".to_string(), Value::Object(info));
        }
        if !content.tags.is_empty() {
            root.insert(
                "tags".to_string(),
                camelize(&Value::Array(content.tags.values()), CamelizeOptions::default()),
            );
        }
        let paths = camelize_tree(&content.paths, CamelizeOptions::between(2, 4));
        root.insert("paths".to_string(), Value::Object(paths.clone()));
        root.insert(
            "definitions".to_string(),
            Value::Object(camelize_tree(
                &content.definitions.into_tree(),
                CamelizeOptions::between(2, 3),
            )),
        );

        let mut root = camelize_tree(&root, CamelizeOptions::to_depth(2));
        // path and verb keys are authored literals
        root.insert("paths".to_string(), Value::Object(paths));
        if let Some(Value::Number(version)) = root.get("swagger") {
            let version = version.to_string();
            root.insert("swagger".to_string(), Value::String(version));
        }

        Document {
            root,
            warnings: content.warnings,
        }
    }
}
