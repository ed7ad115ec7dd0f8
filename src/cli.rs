use crate::config::Config;
use crate::generator::{BasePaths, GenerateOptions, Generator};
use crate::handler::RegistryBuilder;
use crate::parser::{DeclarationParser, ParsedFile};
use crate::routes::PathFilter;
use crate::scanner::DeclarationScanner;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// Generate a Swagger/OpenAPI document from metadata declared for route handlers
#[derive(Parser, Debug)]
#[command(name = "openapi-from-metadata")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Global configuration file (YAML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Route table file (YAML or JSON)
    #[arg(short = 'r', long = "routes", value_name = "FILE")]
    pub routes_path: PathBuf,

    /// Directory of handler declaration files
    #[arg(long = "handlers", value_name = "DIR")]
    pub handlers_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (defaults to the configured output_file_path, then stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Base path to document; replaces the configured base_paths (repeatable)
    #[arg(short = 'b', long = "base-path", value_name = "PATH")]
    pub base_paths: Vec<String>,

    /// Only document the route whose path, relative to its base path, equals this
    #[arg(long = "path-filter", value_name = "PATH", conflicts_with = "path_pattern")]
    pub path_filter: Option<String>,

    /// Only document routes whose path, relative to their base path, matches this regex
    #[arg(long = "path-pattern", value_name = "REGEX")]
    pub path_pattern: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.routes_path.is_file() {
        anyhow::bail!("Route table does not exist: {}", args.routes_path.display());
    }
    if let Some(ref config_path) = args.config_path {
        if !config_path.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config_path.display());
        }
    }
    if let Some(ref handlers_path) = args.handlers_path {
        if !handlers_path.is_dir() {
            anyhow::bail!(
                "Handler declaration path is not a directory: {}",
                handlers_path.display()
            );
        }
    }

    info!("Route table: {}", args.routes_path.display());
    info!("Output format: {:?}", args.output_format);
    match args.config_path {
        Some(ref config_path) => info!("Configuration: {}", config_path.display()),
        None => info!("Configuration: defaults"),
    }
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting document generation...");

    // Step 1: Load global configuration
    let config = match args.config_path {
        Some(ref path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => Config::new(),
    };

    // Step 2: Declare handler metadata
    let mut builder = RegistryBuilder::new();
    let mut declaration_count = 0;
    if let Some(ref handlers_path) = args.handlers_path {
        info!("Scanning handler declarations...");
        let scanner = DeclarationScanner::new(handlers_path.clone());
        let scan_result = scanner.scan()?;
        info!("Found {} declaration files", scan_result.declaration_files.len());

        let parsed_files: Vec<ParsedFile> = DeclarationParser::parse_files(&scan_result.declaration_files)
            .into_iter()
            .filter_map(|r| match r {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Skipping declaration file due to parse error: {:#}", e);
                    None
                }
            })
            .collect();

        for parsed in &parsed_files {
            parsed.apply(&mut builder)?;
            declaration_count += parsed.handlers.len();
        }
    }
    let registry = builder.freeze();
    info!("Registered {} handlers", registry.len());

    // Step 3: Load the route table
    let routes = DeclarationParser::parse_routes(&args.routes_path)?;
    info!("Read {} routes", routes.len());

    // Step 4: Build the document
    let options = GenerateOptions {
        base_paths: (!args.base_paths.is_empty()).then(|| BasePaths::new(&args.base_paths)),
        path_filter: match (&args.path_filter, &args.path_pattern) {
            (Some(path), _) => Some(PathFilter::exact(path)),
            (None, Some(pattern)) => Some(PathFilter::pattern(pattern)?),
            (None, None) => None,
        },
    };
    let document = Generator::new(&config, &registry, &routes)
        .build(options)
        .context("Failed to generate document")?;

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    // Step 6: Output to file or stdout
    match args.output_path.clone().or_else(|| config.output_file_path()) {
        Some(output_path) => {
            info!("Writing output to: {}", output_path.display());
            write_to_file(&content, &output_path)?;
            info!("Successfully wrote document to {}", output_path.display());
        }
        None => println!("{}", content),
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Handler declarations: {}", declaration_count);
    info!("  - Routes read: {}", routes.len());
    info!(
        "  - Paths documented: {}",
        document.get("paths").and_then(|p| p.as_object()).map_or(0, |p| p.len())
    );
    info!("  - Routes skipped: {}", document.warnings().len());

    Ok(())
}
