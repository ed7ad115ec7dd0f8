//! `openapi-from-metadata` binary.
//!
//! Reads a route table and the handler declarations it points at, then prints or writes the
//! Swagger document they describe. The logger honours `RUST_LOG`; `-v` lowers the default
//! level to debug.
//!
//! ```bash
//! # bookstore handlers, configuration from open_api.yml, YAML on stdout
//! openapi-from-metadata -c open_api.yml -r routes.yml --handlers handlers/
//!
//! # only /api/v1, JSON into a file
//! openapi-from-metadata -r routes.yml --handlers handlers/ -b /api/v1 -f json -o api.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use openapi_from_metadata::cli::{self, CliArgs};

fn main() -> Result<()> {
    // logger level depends on -v, so arguments are read before validation can log
    let args = CliArgs::parse();
    let level = match args.verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    let args = cli::parse_args_from_parsed(args)?;
    info!("Reading routes from {}", args.routes_path.display());
    cli::run(args)
}
