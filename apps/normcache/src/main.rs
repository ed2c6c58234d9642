//! # normcache
//!
//! The main binary for the normcache engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │           apps/normcache (THE BINARY)         │
//! │                                               │
//! │  ┌─────────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │    CLI      │  │  config  │  │  replay  │  │
//! │  │   (clap)    │  │  (toml)  │  │  script  │  │
//! │  └──────┬──────┘  └────┬─────┘  └────┬─────┘  │
//! │         └──────────────┼─────────────┘        │
//! │                        ▼                      │
//! │               ┌────────────────┐              │
//! │               │ normcache-core │              │
//! │               │  (THE LOGIC)   │              │
//! │               └────────────────┘              │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! normcache replay steps.json --dump
//! normcache --schema schema.json schema
//! normcache key '{"__typename":"Todo","id":1}'
//! ```

use clap::Parser;
use normcache::cli::{self, Cli};
use normcache::config::AppConfig;
use normcache::logging;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    // Logging depends on the config file, so config errors are printed raw.
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_schema_override(cli.schema.clone()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(config.log_format, config.log_filter.as_deref(), cli.verbose);

    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
