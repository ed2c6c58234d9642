//! # normcache
//!
//! Command-line front end for the normcache engine - THE BINARY.
//!
//! The library half exposes the pieces the binary is built from so they can
//! be tested without spawning a process:
//!
//! - `cli`: clap definitions and command implementations
//! - `config`: the optional `normcache.toml` file
//! - `logging`: tracing subscriber setup
//! - `script`: JSON replay scripts run against an in-memory store

pub mod cli;
pub mod config;
pub mod logging;
pub mod script;
