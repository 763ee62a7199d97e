//! CLI error types and result alias.

use dbmigrator_core::MigrationError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(dbmigrator::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(dbmigrator::config))]
    Config(String),

    /// Migration error
    #[error("{0}")]
    #[diagnostic(code(dbmigrator::migration))]
    Migration(#[from] MigrationError),

    /// Database connection error
    #[error("Database error: {0}")]
    #[diagnostic(code(dbmigrator::database))]
    Database(String),

    /// Dialect not compiled into this build
    #[error("Unsupported dialect: {0}")]
    #[diagnostic(
        code(dbmigrator::unsupported),
        help("rebuild dbmigrator with the matching cargo feature")
    )]
    Unsupported(String),
}

impl CliError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}
