//! Error types for SQLite operations.

use dbmigrator_core::MigrationError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Errors that can occur during SQLite operations.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An update matched no applied record.
    #[error("No applied record for migration {num} '{name}'")]
    MissingRecord {
        /// Stored order key.
        num: String,
        /// Migration name.
        name: String,
    },

    /// An insert collided with an existing applied record.
    #[error("Applied record for migration {num} '{name}' already exists")]
    DuplicateRecord {
        /// Stored order key.
        num: String,
        /// Migration name.
        name: String,
    },
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this is a unique constraint violation.
    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

impl From<SqliteError> for MigrationError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Sqlite(e) => MigrationError::database(e.to_string()),
            other => MigrationError::database(other.to_string()),
        }
    }
}
