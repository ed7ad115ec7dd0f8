//! Named schema objects: shorthand expansion, reference resolution and the definitions table.
//!
//! Objects are declared in a compact form and expanded once at declaration time:
//!
//! ```text
//! {id: integer, name: string, author: author_payload}
//! ```
//!
//! becomes
//!
//! ```text
//! {type: object,
//!  properties: {id: {type: integer, format: int32},
//!               name: {type: string},
//!               author: {type: object, $ref: author_payload}},
//!  required: [id, name, author]}
//! ```
//!
//! During generation, [`SchemaResolver`] swaps reference tokens found under `schema`, `items` and
//! `$ref` for `#/definitions/<name>` pointers and registers each referenced object in a
//! [`DefinitionTable`].

use crate::camelize::camelize_key;
use crate::error::{Error, Result};
use crate::handler::MetadataSource;
use crate::merge::{merge, verify_and_merge, MergeOptions, MergeStrategy};
use crate::tree::{as_token, canonical_json, into_tree, scalar_to_string, MetadataTree};
use log::debug;
use serde_json::Value;

pub const OBJECT_STRATEGIES: &[(&str, MergeStrategy)] = &[("properties", merge_properties)];

/// Keys whose bare-token values are treated as schema references.
const REFERENCE_KEYS: &[&str] = &["schema", "items", "$ref"];

pub fn merge_metadata(base: &mut MetadataTree, incoming: MetadataTree) -> Result<()> {
    merge(base, incoming, &MergeOptions::with_strategies(OBJECT_STRATEGIES))
}

/// Merges a declaration into a handler's object store, keeping `null` values as tombstones.
pub fn declare_metadata(store: &mut MetadataTree, incoming: MetadataTree) -> Result<()> {
    merge(
        store,
        incoming,
        &MergeOptions::with_strategies(OBJECT_STRATEGIES).keeping_tombstones(),
    )
}

fn merge_properties(existing: Option<Value>, incoming: Value, opts: &MergeOptions<'_>) -> Result<Option<Value>> {
    let opts = MergeOptions {
        recursive: true,
        ..*opts
    };
    verify_and_merge(existing, incoming, "properties", &opts)
}

/// Maps a shorthand type name to its `(type, format)` pair.
pub fn type_and_format(type_name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match type_name.to_lowercase().as_str() {
        "integer" => ("integer", Some("int32")),
        "long" => ("integer", Some("int")),
        "float" => ("number", Some("float")),
        "double" => ("number", Some("double")),
        "string" => ("string", None),
        "byte" => ("string", Some("byte")),
        "binary" => ("string", Some("binary")),
        "boolean" => ("boolean", None),
        "date" => ("string", Some("date")),
        "datetime" => ("string", Some("date-time")),
        "password" => ("string", Some("password")),
        _ => return None,
    };
    Some(mapped)
}

/// Expands a declared object into a full `{type: object, properties, required}` schema.
///
/// Properties are presumed required unless marked `required: false`.
pub fn expand_object(metadata: MetadataTree) -> MetadataTree {
    let mut metadata = if is_object_type(&metadata) {
        metadata
    } else {
        let mut wrapped = MetadataTree::new();
        wrapped.insert("type".to_string(), Value::String("object".to_string()));
        wrapped.insert("properties".to_string(), Value::Object(metadata));
        wrapped
    };

    let mut required: Vec<String> = match metadata.get("required") {
        Some(Value::Array(names)) => names.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    };

    if let Some(Value::Object(properties)) = metadata.shift_remove("properties") {
        let expanded = properties
            .into_iter()
            .map(|(name, property)| {
                let property = expand_property(&name, property, &mut required);
                (name, property)
            })
            .collect();
        metadata.insert("properties".to_string(), Value::Object(expanded));
    }

    if !required.is_empty() {
        let mut unique: Vec<String> = Vec::with_capacity(required.len());
        for name in required {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        metadata.insert(
            "required".to_string(),
            Value::Array(unique.into_iter().map(Value::String).collect()),
        );
    }
    metadata
}

fn expand_property(name: &str, property: Value, required: &mut Vec<String>) -> Value {
    match property {
        Value::Object(mut property) => {
            match property.get("required") {
                None => required.push(name.to_string()),
                Some(Value::Bool(flag)) => {
                    if *flag {
                        required.push(name.to_string());
                    }
                    property.shift_remove("required");
                }
                Some(_) => {}
            }
            if needs_expansion(&property) {
                Value::Object(expand_object(property))
            } else {
                Value::Object(property)
            }
        }
        Value::Null | Value::Array(_) => {
            required.push(name.to_string());
            property
        }
        scalar => {
            required.push(name.to_string());
            let type_name = scalar_to_string(&scalar).unwrap_or_default();
            let mut expanded = MetadataTree::new();
            match type_and_format(&type_name) {
                Some((api_type, format)) => {
                    expanded.insert("type".to_string(), Value::String(api_type.to_string()));
                    if let Some(format) = format {
                        expanded.insert("format".to_string(), Value::String(format.to_string()));
                    }
                }
                None => {
                    expanded.insert("type".to_string(), Value::String("object".to_string()));
                    expanded.insert("$ref".to_string(), Value::String(type_name));
                }
            }
            Value::Object(expanded)
        }
    }
}

fn is_object_type(metadata: &MetadataTree) -> bool {
    metadata.get("type").and_then(Value::as_str) == Some("object")
}

/// Whether a property tree is itself a shorthand object declaration.
fn needs_expansion(property: &MetadataTree) -> bool {
    if property.is_empty() || property.contains_key("$ref") {
        return false;
    }
    match property.get("type") {
        None => true,
        Some(_) => is_object_type(property) && property.contains_key("properties"),
    }
}

/// Aggregated declaration of `name` across a handler chain, most specific last-merged.
///
/// Returns `None` when no handler in the chain declares the object.
pub fn object_metadata(chain: &[&dyn MetadataSource], name: &str) -> Option<MetadataTree> {
    let mut declared = false;
    let mut aggregate = MetadataTree::new();
    for source in chain.iter().rev() {
        if let Some(metadata) = source.object_metadata(name) {
            declared = true;
            // Declarations are validated when stored, so merging them again cannot fail
            if let Err(err) = merge_metadata(&mut aggregate, metadata) {
                debug!("Skipping object '{}' from {}: {}", name, source.name(), err);
            }
        }
    }
    declared.then_some(aggregate)
}

/// Generation-scoped table of resolved schemas, deduplicated by content.
#[derive(Debug, Clone, Default)]
pub struct DefinitionTable {
    entries: MetadataTree,
}

impl DefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a table from a pre-built `definitions` tree.
    pub fn from_value(value: Value) -> Result<Self> {
        match into_tree(value) {
            Ok(entries) => Ok(Self {
                entries: entries.unwrap_or_default(),
            }),
            Err(_) => Err(Error::ExpectedTreeDefinitions),
        }
    }

    /// Registers `schema` under `name` and returns the name it was stored under.
    ///
    /// Identical content under an existing name is stored once; differing content is stored
    /// under `name1`, `name2`, ... instead of overwriting.
    pub fn add(&mut self, name: &str, schema: MetadataTree) -> String {
        let mut retry = 0;
        loop {
            let candidate = numbered(name, retry);
            if self.try_insert(&candidate, &schema) {
                return candidate;
            }
            retry += 1;
        }
    }

    /// Stores `schema` under exactly `name` unless different content already holds it.
    fn try_insert(&mut self, name: &str, schema: &MetadataTree) -> bool {
        match self.entries.get(name) {
            Some(Value::Object(existing)) => canonical_json(existing) == canonical_json(schema),
            Some(_) => false,
            None => {
                self.entries.insert(name.to_string(), Value::Object(schema.clone()));
                true
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

    pub fn into_tree(self) -> MetadataTree {
        self.entries
    }
}

/// By-name lookup of declared objects.
///
/// `None` means the name is not an object and the token is left in place.
pub trait ObjectSource {
    fn lookup_object(&self, name: &str) -> Option<Value>;
}

/// Object lookup through a handler's inheritance chain
pub struct ChainObjects<'a> {
    chain: &'a [&'a dyn MetadataSource],
}

impl<'a> ChainObjects<'a> {
    pub fn new(chain: &'a [&'a dyn MetadataSource]) -> Self {
        Self { chain }
    }
}

impl ObjectSource for ChainObjects<'_> {
    fn lookup_object(&self, name: &str) -> Option<Value> {
        object_metadata(self.chain, name).map(Value::Object)
    }
}

/// Replaces schema reference tokens with definition pointers.
///
/// A reference back to an object that is still being resolved becomes a pointer without being
/// expanded again, so self-referential schemas terminate.
pub struct SchemaResolver<'a> {
    source: &'a dyn ObjectSource,
    /// Tokens being resolved, with the definition name each is tried under
    resolving: Vec<(String, String)>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(source: &'a dyn ObjectSource) -> Self {
        Self {
            source,
            resolving: Vec::new(),
        }
    }

    pub fn resolve_refs(&mut self, value: &Value, definitions: &mut DefinitionTable) -> Result<Value> {
        match value {
            Value::Object(tree) => Ok(Value::Object(self.resolve_tree(tree, definitions)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_refs(item, definitions))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    pub fn resolve_tree(&mut self, tree: &MetadataTree, definitions: &mut DefinitionTable) -> Result<MetadataTree> {
        let mut resolved = MetadataTree::new();
        for (key, value) in tree {
            let value = self.resolve_refs(value, definitions)?;
            let reference = match as_token(&value) {
                Some(token) if REFERENCE_KEYS.contains(&key.as_str()) => {
                    self.resolve_token(token, definitions)?
                }
                _ => None,
            };
            let value = match reference {
                Some(pointer) if key == "$ref" => Value::String(pointer),
                Some(pointer) => {
                    let mut wrapped = MetadataTree::new();
                    wrapped.insert("$ref".to_string(), Value::String(pointer));
                    Value::Object(wrapped)
                }
                None => value,
            };
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    /// Registers the object named `token` and returns its definition pointer.
    ///
    /// The definition name is chosen before the object's own references are resolved, so a
    /// self-reference points at the slot the object ends up in. When that slot holds different
    /// content, the attempt is rolled back and the next numbered name is tried.
    fn resolve_token(&mut self, token: &str, definitions: &mut DefinitionTable) -> Result<Option<String>> {
        if let Some((_, candidate)) = self.resolving.iter().find(|(pending, _)| pending == token) {
            return Ok(Some(pointer(candidate)));
        }
        let object = match self.source.lookup_object(token) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(object)) => object,
            Some(_) => {
                return Err(Error::ExpectedTreeFromResolver {
                    kind: "object",
                    name: token.to_string(),
                })
            }
        };

        let name = camelize_key(token);
        let mut retry = 0;
        loop {
            let candidate = numbered(&name, retry);
            let snapshot = definitions.clone();
            self.resolving.push((token.to_string(), candidate.clone()));
            let resolved = self.resolve_tree(&object, definitions);
            self.resolving.pop();

            if definitions.try_insert(&candidate, &resolved?) {
                debug!("Resolved schema reference '{}' as '{}'", token, candidate);
                return Ok(Some(pointer(&candidate)));
            }
            *definitions = snapshot;
            retry += 1;
        }
    }
}

/// `name`, then `name1`, `name2`, ...
fn numbered(name: &str, retry: usize) -> String {
    if retry == 0 {
        name.to_string()
    } else {
        format!("{}{}", name, retry)
    }
}

fn pointer(name: &str) -> String {
    format!("#/definitions/{}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerClass, RegistryBuilder};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    fn tree(value: Value) -> MetadataTree {
        value.as_object().cloned().unwrap()
    }

    struct MapObjects(HashMap<String, Value>);

    impl ObjectSource for MapObjects {
        fn lookup_object(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    #[test]
    fn test_type_and_format_table() {
        assert_eq!(type_and_format("integer"), Some(("integer", Some("int32"))));
        assert_eq!(type_and_format("long"), Some(("integer", Some("int"))));
        assert_eq!(type_and_format("float"), Some(("number", Some("float"))));
        assert_eq!(type_and_format("double"), Some(("number", Some("double"))));
        assert_eq!(type_and_format("string"), Some(("string", None)));
        assert_eq!(type_and_format("byte"), Some(("string", Some("byte"))));
        assert_eq!(type_and_format("binary"), Some(("string", Some("binary"))));
        assert_eq!(type_and_format("boolean"), Some(("boolean", None)));
        assert_eq!(type_and_format("date"), Some(("string", Some("date"))));
        assert_eq!(type_and_format("dateTime"), Some(("string", Some("date-time"))));
        assert_eq!(type_and_format("password"), Some(("string", Some("password"))));
        assert_eq!(type_and_format("genre_payload"), None);
    }

    #[test]
    fn test_expand_shorthand_object() {
        let expanded = expand_object(tree(json!({
            "id": "integer",
            "name": "string",
            "author": "author_payload",
            "createdAt": "dateTime"
        })));
        assert_eq!(
            Value::Object(expanded),
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer", "format": "int32"},
                    "name": {"type": "string"},
                    "author": {"type": "object", "$ref": "author_payload"},
                    "createdAt": {"type": "string", "format": "date-time"}
                },
                "required": ["id", "name", "author", "createdAt"]
            })
        );
    }

    #[test]
    fn test_required_flags() {
        let expanded = expand_object(tree(json!({
            "id": {"type": "integer"},
            "nickname": {"type": "string", "required": false},
            "email": {"type": "string", "required": true}
        })));
        assert_eq!(
            Value::Object(expanded),
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "nickname": {"type": "string"},
                    "email": {"type": "string"}
                },
                "required": ["id", "email"]
            })
        );
    }

    #[test]
    fn test_nested_shorthand_objects_expand() {
        let expanded = expand_object(tree(json!({
            "status": {"code": "integer", "message": {"type": "string", "required": false}}
        })));
        assert_eq!(
            expanded["properties"]["status"],
            json!({
                "type": "object",
                "properties": {
                    "code": {"type": "integer", "format": "int32"},
                    "message": {"type": "string"}
                },
                "required": ["code"]
            })
        );
    }

    #[test]
    fn test_explicit_object_keeps_required_list() {
        let expanded = expand_object(tree(json!({
            "type": "object",
            "properties": {"a": "string", "b": {"type": "string", "required": false}},
            "required": ["b", "a"]
        })));
        assert_eq!(expanded["required"], json!(["b", "a"]));
    }

    #[test]
    fn test_reference_properties_are_left_alone() {
        let expanded = expand_object(tree(json!({
            "genres": {"type": "array", "items": {"$ref": "genre_payload"}, "required": true},
            "owner": {"$ref": "user_payload"}
        })));
        assert_eq!(
            expanded["properties"],
            json!({
                "genres": {"type": "array", "items": {"$ref": "genre_payload"}},
                "owner": {"$ref": "user_payload"}
            })
        );
    }

    #[test]
    fn test_definition_table_dedup() {
        let mut table = DefinitionTable::new();
        let schema = tree(json!({"type": "object", "properties": {"id": {"type": "integer"}}}));
        assert_eq!(table.add("book", schema.clone()), "book");
        assert_eq!(table.add("book", schema), "book");
        assert_eq!(table.len(), 1);

        let other = tree(json!({"type": "object", "properties": {"isbn": {"type": "string"}}}));
        assert_eq!(table.add("book", other.clone()), "book1");
        assert_eq!(table.add("book", other), "book1");
        let third = tree(json!({"type": "string"}));
        assert_eq!(table.add("book", third), "book2");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_definitions_seed_must_be_tree() {
        assert!(matches!(
            DefinitionTable::from_value(json!(["a"])),
            Err(Error::ExpectedTreeDefinitions)
        ));
        let seeded = DefinitionTable::from_value(json!({"error": {"type": "object"}})).unwrap();
        assert_eq!(seeded.len(), 1);
        assert!(DefinitionTable::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_refs_replaces_tokens() {
        let objects = MapObjects(HashMap::from([
            (
                "genre_payload".to_string(),
                json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
            ),
            (
                "genre_list".to_string(),
                json!({"type": "object", "properties": {"genres": {"type": "array", "items": {"$ref": "genre_payload"}}}}),
            ),
        ]));
        let mut definitions = DefinitionTable::new();
        let mut resolver = SchemaResolver::new(&objects);
        let endpoint = json!({
            "responses": {"200": {"schema": "genre_list"}, "404": {"schema": "missing"}},
            "parameters": [{"name": "body", "in": "body", "schema": {"$ref": "genre_payload"}}],
            "description": "genre_list"
        });
        let resolved = resolver.resolve_refs(&endpoint, &mut definitions).unwrap();
        assert_eq!(
            resolved,
            json!({
                "responses": {
                    "200": {"schema": {"$ref": "#/definitions/genreList"}},
                    "404": {"schema": "missing"}
                },
                "parameters": [{"name": "body", "in": "body", "schema": {"$ref": "#/definitions/genrePayload"}}],
                "description": "genre_list"
            })
        );
        assert_eq!(
            definitions.get("genreList"),
            Some(&json!({"type": "object", "properties": {"genres": {"type": "array", "items": {"$ref": "#/definitions/genrePayload"}}}}))
        );
        assert_eq!(definitions.len(), 2);
    }

    #[test]
    fn test_self_referential_schema_terminates() {
        let objects = MapObjects(HashMap::from([(
            "node".to_string(),
            json!({"type": "object", "properties": {"children": {"type": "array", "items": "node"}}}),
        )]));
        let mut definitions = DefinitionTable::new();
        let resolved = SchemaResolver::new(&objects)
            .resolve_refs(&json!({"schema": "node"}), &mut definitions)
            .unwrap();
        assert_eq!(resolved, json!({"schema": {"$ref": "#/definitions/node"}}));
        assert_eq!(
            definitions.get("node"),
            Some(&json!({"type": "object", "properties": {"children": {"type": "array", "items": {"$ref": "#/definitions/node"}}}}))
        );
    }

    #[test]
    fn test_renamed_self_referential_schema_points_at_itself() {
        let objects = MapObjects(HashMap::from([(
            "node".to_string(),
            json!({"type": "object", "properties": {"next": {"type": "object", "$ref": "node"}}}),
        )]));
        let mut definitions = DefinitionTable::new();
        definitions.add("node", tree(json!({"type": "string"})));

        let mut resolver = SchemaResolver::new(&objects);
        let resolved = resolver
            .resolve_refs(&json!({"schema": "node"}), &mut definitions)
            .unwrap();
        assert_eq!(resolved, json!({"schema": {"$ref": "#/definitions/node1"}}));
        assert_eq!(definitions.get("node"), Some(&json!({"type": "string"})));
        assert_eq!(
            definitions.get("node1"),
            Some(&json!({"type": "object", "properties": {"next": {"type": "object", "$ref": "#/definitions/node1"}}}))
        );
        assert_eq!(definitions.len(), 2);

        // Resolving again reuses the renamed definition
        let again = resolver
            .resolve_refs(&json!({"schema": "node"}), &mut definitions)
            .unwrap();
        assert_eq!(again, resolved);
        assert_eq!(definitions.len(), 2);
    }

    #[test]
    fn test_renamed_mutual_references_leave_no_stale_definitions() {
        let objects = MapObjects(HashMap::from([
            (
                "author".to_string(),
                json!({"type": "object", "properties": {"books": {"type": "array", "items": "book"}}}),
            ),
            (
                "book".to_string(),
                json!({"type": "object", "properties": {"author": {"type": "object", "$ref": "author"}}}),
            ),
        ]));
        let mut definitions = DefinitionTable::new();
        definitions.add("author", tree(json!({"type": "string"})));

        let resolved = SchemaResolver::new(&objects)
            .resolve_refs(&json!({"schema": "author"}), &mut definitions)
            .unwrap();
        assert_eq!(resolved, json!({"schema": {"$ref": "#/definitions/author1"}}));
        assert_eq!(
            definitions.get("book"),
            Some(&json!({"type": "object", "properties": {"author": {"type": "object", "$ref": "#/definitions/author1"}}}))
        );
        let names: Vec<_> = definitions.into_tree().keys().cloned().collect();
        assert_eq!(names, vec!["author", "book", "author1"]);
    }

    #[test]
    fn test_non_tree_lookup_fails() {
        let objects = MapObjects(HashMap::from([("bad".to_string(), json!("oops"))]));
        let err = SchemaResolver::new(&objects)
            .resolve_refs(&json!({"schema": "bad"}), &mut DefinitionTable::new())
            .unwrap_err();
        assert!(matches!(err, Error::ExpectedTreeFromResolver { kind: "object", .. }));
    }

    #[test]
    fn test_conflicting_objects_are_renamed() {
        let mut builder = RegistryBuilder::new();
        builder
            .handler("Books", None)
            .declare_object("payload", json!({"id": "integer"}))
            .unwrap();
        builder
            .handler("Genres", None)
            .declare_object("payload", json!({"name": "string"}))
            .unwrap();
        let registry = builder.freeze();

        let mut definitions = DefinitionTable::new();
        let books = registry.hierarchy("Books");
        let genres = registry.hierarchy("Genres");
        let first = SchemaResolver::new(&ChainObjects::new(&books))
            .resolve_refs(&json!({"schema": "payload"}), &mut definitions)
            .unwrap();
        let second = SchemaResolver::new(&ChainObjects::new(&genres))
            .resolve_refs(&json!({"schema": "payload"}), &mut definitions)
            .unwrap();
        assert_eq!(first, json!({"schema": {"$ref": "#/definitions/payload"}}));
        assert_eq!(second, json!({"schema": {"$ref": "#/definitions/payload1"}}));
    }

    #[test]
    fn test_object_aggregation_across_chain() {
        let mut builder = RegistryBuilder::new();
        builder
            .handler("Base", None)
            .declare_object("status", json!({"code": "integer", "message": "string"}))
            .unwrap();
        builder
            .handler("Books", Some("Base"))
            .declare_object("status", json!({"message": {"type": "string", "max_length": 20}}))
            .unwrap();
        let registry = builder.freeze();
        let chain = registry.hierarchy("Books");
        let status = object_metadata(&chain, "status").unwrap();
        assert_eq!(
            status["properties"],
            json!({
                "code": {"type": "integer", "format": "int32"},
                "message": {"type": "string", "max_length": 20}
            })
        );
        assert!(object_metadata(&chain, "unknown").is_none());

        let lone = HandlerClass::new("Lone");
        let lone_chain: Vec<&dyn MetadataSource> = vec![&lone];
        assert!(object_metadata(&lone_chain, "status").is_none());
    }
}
