//! Logging setup for the `dbmigrator` binary.
//!
//! Diagnostics go to stderr so that command output on stdout stays clean.
//!
//! # Environment Variables
//!
//! - `DBMIGRATOR_LOG=debug|info|warn|error|trace` - Set the log level
//! - `DBMIGRATOR_LOG_FORMAT=json|pretty|compact` - Set output format (default: compact)
//!
//! `-v` raises the level to `debug`, `-vv` to `trace`. An explicit
//! `DBMIGRATOR_LOG` wins over the flag.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Environment variable holding the log level.
pub const LOG_LEVEL_VAR: &str = "DBMIGRATOR_LOG";

/// Environment variable holding the log format.
pub const LOG_FORMAT_VAR: &str = "DBMIGRATOR_LOG_FORMAT";

const CRATES: &[&str] = &[
    "dbmigrator",
    "dbmigrator_cli",
    "dbmigrator_core",
    "dbmigrator_sqlite",
    "dbmigrator_mssql",
    "dbmigrator_oracle",
];

/// Resolve the log level from an explicit setting and the `-v` count.
pub fn resolve_level(requested: Option<&str>, verbose: u8) -> &'static str {
    let explicit = requested.and_then(|level| match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    });

    explicit.unwrap_or(match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    })
}

/// Resolve the output format. Defaults to "compact".
pub fn resolve_format(requested: Option<&str>) -> &'static str {
    requested
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "json" => "json",
            _ => "compact",
        })
        .unwrap_or("compact")
}

/// Filter directive enabling `level` for every dbmigrator crate.
pub fn filter_directive(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging. Subsequent calls are no-ops.
pub fn init(verbose: u8) {
    INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let level = resolve_level(env::var(LOG_LEVEL_VAR).ok().as_deref(), verbose);
        let format = resolve_format(env::var(LOG_FORMAT_VAR).ok().as_deref());

        let filter =
            EnvFilter::try_new(filter_directive(level)).unwrap_or_else(|_| EnvFilter::new("warn"));

        match format {
            "json" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            "pretty" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact().with_writer(std::io::stderr))
                    .init();
            }
        }

        tracing::debug!(level = level, format = format, "Logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_defaults_to_warn() {
        assert_eq!(resolve_level(None, 0), "warn");
    }

    #[test]
    fn test_verbose_raises_level() {
        assert_eq!(resolve_level(None, 1), "debug");
        assert_eq!(resolve_level(None, 3), "trace");
    }

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(resolve_level(Some("ERROR"), 2), "error");
        assert_eq!(resolve_level(Some("chatty"), 1), "debug");
    }

    #[test]
    fn test_format() {
        assert_eq!(resolve_format(None), "compact");
        assert_eq!(resolve_format(Some("JSON")), "json");
        assert_eq!(resolve_format(Some("pretty")), "pretty");
        assert_eq!(resolve_format(Some("xml")), "compact");
    }

    #[test]
    fn test_filter_directive() {
        let directive = filter_directive("info");
        assert!(directive.starts_with("dbmigrator=info,"));
        assert!(directive.contains("dbmigrator_core=info"));
        assert!(directive.contains("dbmigrator_oracle=info"));
    }
}
