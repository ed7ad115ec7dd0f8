//! Generates a Swagger/OpenAPI document from declarative metadata attached to route handlers.
//!
//! Handlers declare metadata fragments (controller-wide, per path, per action) together with
//! named schema objects and tags. Handlers form inheritance chains, and a subclass may override
//! or delete (with `null`) anything it inherits. Document generation walks the application's
//! route table, aggregates each route's metadata across its handler chain, resolves schema and
//! tag references into shared, deduplicated tables, and renders the result with camel-cased keys.
//!
//! # Architecture
//!
//! 1. [`merge`] - Generic tree merge with per-key strategies and tombstones
//! 2. [`camelize`] - Depth-bounded key casing
//! 3. [`handler`] - Handler metadata stores and the registry that owns them
//! 4. [`endpoints`] - Endpoint strategies, chain aggregation and parameter lists
//! 5. [`objects`] - Schema expansion, reference resolution and the definitions table
//! 6. [`tags`] - Tag resolution and the tags table
//! 7. [`routes`] - Route table entries and path filters
//! 8. [`generator`] - Document assembly
//! 9. [`config`], [`scanner`], [`parser`], [`serializer`] - Loading inputs and writing output
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_metadata::{
//!     config::Config,
//!     generator::{GenerateOptions, Generator},
//!     handler::RegistryBuilder,
//!     routes::{Route, Verb},
//!     serializer::serialize_json,
//! };
//! use serde_json::json;
//!
//! let mut builder = RegistryBuilder::new();
//! let books = builder.handler("BooksController", None);
//! books.declare_controller_metadata(json!({"tags": [{"name": "Books"}]})).unwrap();
//! books.declare_object("book_payload", json!({"id": "integer", "name": "string"})).unwrap();
//! books
//!     .declare_action_metadata("index", json!({"responses": {"200": {"schema": "book_payload"}}}))
//!     .unwrap();
//! let registry = builder.freeze();
//!
//! let mut config = Config::new();
//! config.configure(json!({"info": {"title": "Bookstore"}, "base_paths": ["/api/v1"]})).unwrap();
//!
//! let routes = vec![Route::new(Verb::Get, "/api/v1/books", "BooksController", "index")];
//! let document = Generator::new(&config, &registry, &routes)
//!     .build(GenerateOptions::default())
//!     .unwrap();
//! println!("{}", serialize_json(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod camelize;
pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod generator;
pub mod handler;
pub mod merge;
pub mod objects;
pub mod parser;
pub mod routes;
pub mod scanner;
pub mod serializer;
pub mod tags;
pub mod tree;
