//! # Configuration File
//!
//! The optional `normcache.toml`:
//!
//! ```toml
//! schema = "schema.json"      # introspection result, relative to this file
//! log_format = "json"         # "text" or "json"
//! log_filter = "normcache=debug"
//! ```
//!
//! Command-line flags override every value here.

use crate::logging::LogFormat;
use normcache_core::CacheError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "normcache.toml";

/// Settings read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Introspection schema to load into the store.
    pub schema: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    /// Fallback `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl AppConfig {
    /// Load the config.
    ///
    /// An explicit path must exist. Without one, `normcache.toml` in the
    /// working directory is used if present, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CacheError> {
        match explicit {
            Some(path) => read_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    read_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse config text.
    pub fn from_toml(input: &str) -> Result<Self, CacheError> {
        toml::from_str(input)
            .map_err(|e| CacheError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_schema_override(mut self, schema: Option<PathBuf>) -> Self {
        if schema.is_some() {
            self.schema = schema;
        }
        self
    }
}

fn read_file(path: &Path) -> Result<AppConfig, CacheError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        CacheError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    let mut config = AppConfig::from_toml(&contents)?;

    // Schema paths are relative to the config file, not the working directory.
    if let (Some(schema), Some(dir)) = (config.schema.as_ref(), path.parent()) {
        if schema.is_relative() {
            config.schema = Some(dir.join(schema));
        }
    }
    Ok(config)
}
