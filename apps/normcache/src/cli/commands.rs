//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::script::{Outcome, Script, replay};
use normcache_core::{
    CacheConfig, CacheError, Completeness, IntrospectionSchema, OperationKind, SchemaPredicates,
    Store, StoreSnapshot,
};
use serde::Serialize;
use serde_json::Value as Json;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a replay script (100 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of an introspection schema (50 MB).
const MAX_SCHEMA_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CacheError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CacheError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CacheError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize `path` and check it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CacheError> {
    let canonical = path.canonicalize().map_err(|e| {
        CacheError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CacheError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read a bounded input file to a string.
fn read_input(path: &Path, max_size: u64) -> Result<String, CacheError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, max_size)?;
    std::fs::read_to_string(&path)
        .map_err(|e| CacheError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

// =============================================================================
// STORE SETUP
// =============================================================================

/// Load an introspection schema, if a path is given.
pub fn load_schema(path: Option<&Path>) -> Result<Option<IntrospectionSchema>, CacheError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let contents = read_input(path, MAX_SCHEMA_FILE_SIZE)?;
    let schema = IntrospectionSchema::from_json(&contents)?;
    tracing::info!(path = %path.display(), types = schema.types.len(), "Loaded schema");
    Ok(Some(schema))
}

/// Build an empty store over the schema at `path`.
pub fn build_store(path: Option<&Path>) -> Result<Store, CacheError> {
    let mut config = CacheConfig::new();
    if let Some(schema) = load_schema(path)? {
        config = config.schema(schema);
    }
    Store::new(config)
}

fn completeness_label(completeness: Completeness) -> &'static str {
    match completeness {
        Completeness::Empty => "EMPTY",
        Completeness::Partial => "PARTIAL",
        Completeness::Full => "FULL",
    }
}

// =============================================================================
// REPLAY COMMAND
// =============================================================================

#[derive(Serialize)]
struct ReplayReport {
    outcomes: Vec<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<StoreSnapshot>,
}

/// Run a replay script against a fresh store.
pub fn cmd_replay(
    schema: Option<&Path>,
    json_mode: bool,
    script_path: &Path,
    dump: bool,
) -> Result<(), CacheError> {
    let mut store = build_store(schema)?;
    let script = Script::from_json(&read_input(script_path, MAX_SCRIPT_FILE_SIZE)?)?;
    tracing::info!(steps = script.steps.len(), "Replaying script");

    let outcomes = replay(&mut store, &script)?;
    let snapshot = dump.then(|| store.snapshot());

    if json_mode {
        let report = ReplayReport { outcomes, snapshot };
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        return Ok(());
    }

    for outcome in &outcomes {
        let verdict = outcome
            .completeness
            .map(completeness_label)
            .unwrap_or("-");
        println!("[{}] {:<16} {}", outcome.step, outcome.op, verdict);
        if !outcome.dependencies.is_empty() {
            let keys: Vec<&str> = outcome.dependencies.iter().map(String::as_str).collect();
            println!("    dependencies: {}", keys.join(", "));
        }
        if !outcome.layers.is_empty() {
            println!("    layers:       {:?}", outcome.layers);
        }
        if let Some(data) = &outcome.data {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        }
    }

    if let Some(snapshot) = snapshot {
        println!();
        println!("Store:");
        println!("{}", serde_json::to_string_pretty(&snapshot).unwrap_or_default());
    }

    Ok(())
}

// =============================================================================
// SCHEMA COMMAND
// =============================================================================

#[derive(Serialize)]
struct SchemaSummary<'a> {
    permissive: bool,
    query: &'a str,
    mutation: &'a str,
    subscription: &'a str,
    types: usize,
}

/// Summarize the schema in effect.
pub fn cmd_schema(schema: Option<&Path>, json_mode: bool) -> Result<(), CacheError> {
    let introspection = load_schema(schema)?;
    let predicates = SchemaPredicates::new(introspection.as_ref());
    let summary = SchemaSummary {
        permissive: predicates.is_permissive(),
        query: predicates.root_key(OperationKind::Query),
        mutation: predicates.root_key(OperationKind::Mutation),
        subscription: predicates.root_key(OperationKind::Subscription),
        types: introspection.as_ref().map_or(0, |s| s.types.len()),
    };

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
        return Ok(());
    }

    println!("Schema:");
    if summary.permissive {
        println!("  Mode:         permissive (no schema loaded)");
    } else {
        println!("  Mode:         schema-aware ({} types)", summary.types);
    }
    println!("  Query:        {}", summary.query);
    println!("  Mutation:     {}", summary.mutation);
    println!("  Subscription: {}", summary.subscription);

    Ok(())
}

// =============================================================================
// KEY COMMAND
// =============================================================================

/// Print the entity key of a JSON object.
pub fn cmd_key(schema: Option<&Path>, json_mode: bool, input: &str) -> Result<(), CacheError> {
    let value: Json = serde_json::from_str(input)
        .map_err(|e| CacheError::SerializationError(format!("Invalid JSON: {}", e)))?;
    let store = build_store(schema)?;
    let key = store.key_of_entity(&value);

    if json_mode {
        println!("{}", serde_json::json!({ "key": key }));
    } else {
        match key {
            Some(key) => println!("{}", key),
            None => println!("(not normalizable)"),
        }
    }
    Ok(())
}
