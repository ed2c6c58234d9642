//! # normcache CLI Module
//!
//! This module implements the CLI interface for normcache.
//!
//! ## Available Commands
//!
//! - `replay` - Run a JSON replay script against a fresh store
//! - `schema` - Summarize the loaded schema
//! - `key` - Print the entity key of a JSON object

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use normcache_core::CacheError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// normcache - normalized GraphQL response cache
///
/// Replays cache operations against an in-memory store and reports what the
/// cache could answer.
#[derive(Parser, Debug)]
#[command(name = "normcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (default: ./normcache.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Introspection schema JSON; overrides the config file
    #[arg(short, long, global = true)]
    pub schema: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a script of cache operations
    Replay {
        /// Path to the script file
        script: PathBuf,

        /// Print the final store contents
        #[arg(short, long)]
        dump: bool,
    },

    /// Summarize the schema in effect
    Schema,

    /// Print the entity key of a JSON object
    Key {
        /// The object, e.g. '{"__typename":"Todo","id":1}'
        json: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
///
/// `config` already carries the `--schema` override.
pub fn execute(cli: Cli, config: &AppConfig) -> Result<(), CacheError> {
    let schema = config.schema.as_deref();
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Replay { script, dump } => cmd_replay(schema, json_mode, &script, dump),
        Commands::Schema => cmd_schema(schema, json_mode),
        Commands::Key { json } => cmd_key(schema, json_mode, &json),
    }
}
