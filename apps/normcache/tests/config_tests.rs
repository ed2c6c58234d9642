//! Config file loading tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use normcache::config::AppConfig;
use normcache::logging::LogFormat;
use normcache_core::CacheError;
use std::fs;
use std::path::PathBuf;

#[test]
fn test_load_explicit_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("normcache.toml");
    fs::write(&path, "log_format = \"json\"\nlog_filter = \"normcache=warn\"\n").unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.log_format, Some(LogFormat::Json));
    assert_eq!(config.log_filter.as_deref(), Some("normcache=warn"));
    assert_eq!(config.schema, None);
}

#[test]
fn test_relative_schema_resolves_against_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("normcache.toml");
    fs::write(&path, "schema = \"schema.json\"\n").unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.schema, Some(dir.path().join("schema.json")));
}

#[test]
fn test_absolute_schema_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("normcache.toml");
    let absolute = dir.path().join("elsewhere").join("schema.json");
    fs::write(&path, format!("schema = {:?}\n", absolute.display().to_string())).unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.schema, Some(absolute));
}

#[test]
fn test_missing_explicit_config_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, CacheError::IoError(_)));
}

#[test]
fn test_malformed_config_is_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("normcache.toml");
    fs::write(&path, "log_format = \"yaml\"\n").unwrap();

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, CacheError::SerializationError(_)));
}

#[test]
fn test_cli_schema_overrides_file() {
    let config = AppConfig::from_toml("schema = \"from-file.json\"\n")
        .unwrap()
        .with_schema_override(Some(PathBuf::from("from-flag.json")));
    assert_eq!(config.schema, Some(PathBuf::from("from-flag.json")));
}
