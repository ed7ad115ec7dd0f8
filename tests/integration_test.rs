use openapi_from_metadata::{
    config::Config,
    error::Error,
    generator::{BasePaths, Document, GenerateOptions, Generator, WarningKind},
    handler::{Registry, RegistryBuilder},
    parser::DeclarationParser,
    routes::{PathFilter, Route, Verb},
    scanner::DeclarationScanner,
    serializer::{serialize_json, serialize_yaml, write_document},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/bookstore")
        .join(path)
}

/// Scans, parses and declares every handler file under the bookstore fixture
fn load_registry() -> Registry {
    let scanner = DeclarationScanner::new(fixture("handlers"));
    let scan_result = scanner.scan().expect("Failed to scan handler declarations");
    assert_eq!(scan_result.declaration_files.len(), 4);

    let mut builder = RegistryBuilder::new();
    for result in DeclarationParser::parse_files(&scan_result.declaration_files) {
        let parsed = result.expect("Failed to parse declaration file");
        parsed.apply(&mut builder).expect("Failed to declare handlers");
    }
    builder.freeze()
}

fn load_document() -> Document {
    let config = Config::load(&fixture("open_api.yml")).expect("Failed to load configuration");
    let registry = load_registry();
    let routes = DeclarationParser::parse_routes(&fixture("routes.yml")).expect("Failed to parse routes");
    Generator::new(&config, &registry, &routes)
        .build(GenerateOptions::default())
        .expect("Failed to build document")
}

fn parameter_names(operation: &Value) -> Vec<(String, String)> {
    operation["parameters"]
        .as_array()
        .expect("operation has parameters")
        .iter()
        .map(|p| {
            (
                p["name"].as_str().unwrap_or_default().to_string(),
                p["in"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[test]
fn test_single_handler_end_to_end() {
    let mut builder = RegistryBuilder::new();
    let books = builder.handler("BooksController", None);
    books
        .declare_object("book_payload", json!({"id": "integer", "title": "string"}))
        .unwrap();
    books
        .declare_action_metadata("index", json!({"responses": {"200": {"schema": "book_payload"}}}))
        .unwrap();
    let registry = builder.freeze();

    let mut config = Config::new();
    config.configure(json!({"base_paths": ["/api/v1"]})).unwrap();
    let routes = vec![Route::new(Verb::Get, "/api/v1/books", "BooksController", "index")];

    let doc = Generator::new(&config, &registry, &routes)
        .build(GenerateOptions::default())
        .unwrap();

    assert_eq!(
        doc.get("paths").unwrap()["/books"]["get"]["responses"]["200"]["schema"],
        json!({"$ref": "#/definitions/bookPayload"})
    );
    assert_eq!(
        doc.get("definitions").unwrap()["bookPayload"],
        json!({
            "type": "object",
            "properties": {"id": {"type": "integer", "format": "int32"}, "title": {"type": "string"}},
            "required": ["id", "title"]
        })
    );
}

#[test]
fn test_bookstore_document_from_fixtures() {
    let doc = load_document();

    let keys: Vec<_> = doc.root().keys().cloned().collect();
    assert_eq!(keys, vec!["swagger", "schemes", "info", "tags", "paths", "definitions"]);
    assert_eq!(doc.get("swagger"), Some(&json!("2.0")));
    assert_eq!(doc.get("schemes"), Some(&json!(["http"])));

    let info = doc.get("info").unwrap();
    assert_eq!(info["title"], "OpenAPI Book Store Public API");
    assert_eq!(info["version"], "1.0.0");
    assert_eq!(info["termsOfService"], "https://www.openapibookstore.com/terms_of_service");
    assert_eq!(info["license"]["name"], "Apache 2.0");

    assert_eq!(
        doc.get("tags"),
        Some(&json!([
            {"name": "Books", "description": "Comprehensive list of available books"},
            {"name": "Genres", "description": "View and manage genres"}
        ]))
    );

    let paths: Vec<_> = doc.get("paths").unwrap().as_object().unwrap().keys().cloned().collect();
    assert_eq!(paths, vec!["/books", "/books/{book_id}", "/genres", "/genres/{genre_id}"]);

    // Routes outside the base path and hidden actions are not documented
    let book = &doc.get("paths").unwrap()["/books/{book_id}"];
    let verbs: Vec<_> = book.as_object().unwrap().keys().cloned().collect();
    assert_eq!(verbs, vec!["get", "patch"]);

    // The unregistered handler is the only skipped route
    assert_eq!(doc.warnings().len(), 1);
    assert_eq!(doc.warnings()[0].kind, WarningKind::UnresolvedHandler);
    assert!(doc.warnings()[0].message.contains("AuthorsController"));
}

#[test]
fn test_three_level_inheritance() {
    let doc = load_document();
    let paths = doc.get("paths").unwrap();

    let index = &paths["/books"]["get"];
    assert_eq!(index["description"], "Retrieve list of available books");
    assert_eq!(index["produces"], json!(["application/json"]));
    assert_eq!(index["tags"], json!(["Books"]));
    // BooksController tombstones the header BaseController declares
    assert_eq!(
        parameter_names(index),
        vec![
            ("Authorization".to_string(), "header".to_string()),
            ("X-Api-Version".to_string(), "header".to_string()),
            ("access_token".to_string(), "query".to_string()),
            ("page".to_string(), "query".to_string()),
        ]
    );
    assert_eq!(
        index["parameters"][3],
        json!({"name": "page", "in": "query", "type": "integer"})
    );
    assert_eq!(
        index["responses"]["200"]["schema"],
        json!({"type": "array", "items": {"$ref": "#/definitions/bookPayload"}})
    );

    let show = &paths["/books/{book_id}"]["get"];
    let codes: Vec<_> = show["responses"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(codes, vec!["401", "403", "404", "200"]);
    assert_eq!(
        show["parameters"][2],
        json!({"name": "book_id", "in": "path", "type": "integer", "required": true, "description": "Book identifier"})
    );

    // GenresController inherits from BaseController directly
    let genre = &paths["/genres/{genre_id}"]["get"];
    assert!(genre.get("produces").is_none());
    assert_eq!(
        parameter_names(genre),
        vec![
            ("Authorization".to_string(), "header".to_string()),
            ("X-Legacy-Client".to_string(), "header".to_string()),
            ("genre_id".to_string(), "path".to_string()),
            ("access_token".to_string(), "query".to_string()),
        ]
    );
}

#[test]
fn test_body_parameters_and_definitions() {
    let doc = load_document();
    let paths = doc.get("paths").unwrap();

    assert_eq!(
        paths["/books"]["post"]["parameters"].as_array().unwrap().last(),
        Some(&json!({"name": "body", "in": "body", "schema": {"$ref": "#/definitions/bookPayload"}}))
    );
    assert_eq!(
        paths["/books/{book_id}"]["patch"]["parameters"].as_array().unwrap().last(),
        Some(&json!({
            "name": "body",
            "in": "body",
            "description": "Payload",
            "schema": {"$ref": "#/definitions/bookPayload"}
        }))
    );

    let definitions = doc.get("definitions").unwrap().as_object().unwrap();
    assert_eq!(definitions.len(), 3);
    assert_eq!(definitions["bookPayload"]["required"], json!(["id", "title"]));
    assert_eq!(definitions["bookPayload"]["properties"]["isbn"], json!({"type": "string"}));
    assert_eq!(
        definitions["genreListResponse"]["properties"]["genres"],
        json!({"type": "array", "items": {"$ref": "#/definitions/genrePayload"}})
    );
    assert!(definitions.contains_key("genrePayload"));
}

#[test]
fn test_duplicate_route_is_skipped() {
    let config = Config::load(&fixture("open_api.yml")).unwrap();
    let registry = load_registry();
    let routes = vec![
        Route::new(Verb::Get, "/api/v1/genres", "GenresController", "index"),
        Route::new(Verb::Get, "/api/v1/genres", "BooksController", "index").named("shadowed_genres"),
    ];

    let doc = Generator::new(&config, &registry, &routes)
        .build(GenerateOptions::default())
        .unwrap();

    assert_eq!(doc.warnings().len(), 1);
    assert_eq!(doc.warnings()[0].kind, WarningKind::DuplicateRoute);
    assert_eq!(
        doc.get("paths").unwrap()["/genres"]["get"]["description"],
        "Retrieve list of available genres"
    );
}

#[test]
fn test_base_path_override_and_filter() {
    let config = Config::load(&fixture("open_api.yml")).unwrap();
    let registry = load_registry();
    let routes = DeclarationParser::parse_routes(&fixture("routes.yml")).unwrap();

    let options = GenerateOptions {
        base_paths: Some(BasePaths::new(["/api"])),
        path_filter: Some(PathFilter::pattern("^/v1/genres").unwrap()),
    };
    let doc = Generator::new(&config, &registry, &routes).build(options).unwrap();

    let paths: Vec<_> = doc.get("paths").unwrap().as_object().unwrap().keys().cloned().collect();
    assert_eq!(paths, vec!["/v1/genres", "/v1/genres/{genre_id}"]);
    assert!(doc.warnings().is_empty());
    assert_eq!(doc.get("tags"), Some(&json!([{"name": "Genres", "description": "View and manage genres"}])));
}

#[test]
fn test_serialized_output_parses_back() {
    let doc = load_document();

    let json_output = serialize_json(&doc).expect("Failed to serialize JSON");
    let from_json: Value = serde_json::from_str(&json_output).unwrap();
    assert_eq!(from_json, Value::Object(doc.root().clone()));

    let yaml_output = serialize_yaml(&doc).expect("Failed to serialize YAML");
    let from_yaml: Value = serde_yaml::from_str(&yaml_output).unwrap();
    assert_eq!(from_yaml["paths"]["/books"]["get"]["tags"], json!(["Books"]));
    assert_eq!(from_yaml["definitions"]["bookPayload"]["type"], "object");
}

#[test]
fn test_write_document_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("doc").join("api-docs.json");
    let config = Config::load(&fixture("open_api.yml")).unwrap();
    assert_eq!(config.output_file_path(), Some(PathBuf::from("doc/api-docs.json")));

    let registry = load_registry();
    let routes = DeclarationParser::parse_routes(&fixture("routes.yml")).unwrap();
    let doc = write_document(&config, Some(&target), || {
        Generator::new(&config, &registry, &routes).build(GenerateOptions::default())
    })
    .expect("Failed to write document");

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(written, Value::Object(doc.into_tree()));
}

#[test]
fn test_missing_base_paths_fails_without_output() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("api-docs.json");
    let config = Config::new();
    let registry = load_registry();
    let routes = DeclarationParser::parse_routes(&fixture("routes.yml")).unwrap();

    let result = write_document(&config, Some(&target), || {
        Generator::new(&config, &registry, &routes).build(GenerateOptions::default())
    });
    assert!(matches!(result, Err(Error::MissingBasePaths)));
    assert!(!target.exists());
}
