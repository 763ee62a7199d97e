//! Error types for Oracle operations.

use dbmigrator_core::MigrationError;
use thiserror::Error;

/// Result type for Oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors that can occur during Oracle operations.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Oracle driver error.
    #[error("oracle error: {0}")]
    Oracle(#[from] oracle::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Row decoding error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl OracleError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

impl From<OracleError> for MigrationError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Oracle(e) => MigrationError::database(e.to_string()),
            other => MigrationError::database(other.to_string()),
        }
    }
}
