//! Error types for Microsoft SQL Server operations.

use dbmigrator_core::MigrationError;
use thiserror::Error;

/// Result type for MSSQL operations.
pub type MssqlResult<T> = Result<T, MssqlError>;

/// Errors that can occur during MSSQL operations.
#[derive(Error, Debug)]
pub enum MssqlError {
    /// Tiberius/SQL Server error.
    #[error("sql server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// Socket or runtime error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Row decoding error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Timeout error.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// The applied-set table already holds a record with this key.
    #[error("applied-set record ({num}, {name}) already exists")]
    DuplicateRecord {
        /// Stored migration number.
        num: String,
        /// Migration name.
        name: String,
    },
}

impl MssqlError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// SQL Server error number, when the server reported one.
    pub(crate) fn server_code(&self) -> Option<u32> {
        match self {
            Self::SqlServer(tiberius::error::Error::Server(token)) => Some(token.code()),
            _ => None,
        }
    }

    /// Check if this is a unique constraint violation (2627 or 2601).
    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(self.server_code(), Some(2627) | Some(2601))
    }
}

impl From<MssqlError> for MigrationError {
    fn from(err: MssqlError) -> Self {
        match err {
            MssqlError::SqlServer(tiberius::error::Error::Server(token)) => {
                MigrationError::database(format!("{} (error {})", token.message(), token.code()))
            }
            other => MigrationError::database(other.to_string()),
        }
    }
}
