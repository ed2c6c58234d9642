//! # Logging
//!
//! Tracing subscriber initialisation for the binary.
//!
//! `NORMCACHE_LOG_FORMAT=json` enables machine-parseable output and wins over
//! the config file. `RUST_LOG` wins over the configured filter.

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "NORMCACHE_LOG_FORMAT";

/// Filter used when neither `RUST_LOG` nor the config file sets one.
pub const DEFAULT_FILTER: &str = "normcache=info,normcache_core=info";

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "normcache=debug,normcache_core=debug";

/// Output format of log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Pick the format: environment first, then config, then text.
pub fn resolve_format(env_value: Option<&str>, configured: Option<LogFormat>) -> LogFormat {
    env_value
        .and_then(LogFormat::from_name)
        .or(configured)
        .unwrap_or_default()
}

/// Pick the fallback filter directive used when `RUST_LOG` is unset.
pub fn resolve_filter(configured: Option<&str>, verbose: bool) -> String {
    if verbose {
        return VERBOSE_FILTER.to_string();
    }
    configured.unwrap_or(DEFAULT_FILTER).to_string()
}

/// Install the global subscriber.
pub fn init(configured_format: Option<LogFormat>, configured_filter: Option<&str>, verbose: bool) {
    let env_format = std::env::var(LOG_FORMAT_ENV).ok();
    let format = resolve_format(env_format.as_deref(), configured_format);

    let fallback = resolve_filter(configured_filter, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // Logs go to stderr so stdout stays parseable in json mode.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_config() {
        assert_eq!(resolve_format(Some("JSON"), Some(LogFormat::Text)), LogFormat::Json);
        assert_eq!(resolve_format(Some("bogus"), Some(LogFormat::Json)), LogFormat::Json);
        assert_eq!(resolve_format(None, None), LogFormat::Text);
    }

    #[test]
    fn verbose_raises_filter() {
        assert_eq!(resolve_filter(Some("warn"), true), VERBOSE_FILTER);
        assert_eq!(resolve_filter(Some("warn"), false), "warn");
        assert_eq!(resolve_filter(None, false), DEFAULT_FILTER);
    }
}
