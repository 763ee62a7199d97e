//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opaque failure reported by the execution transport.
    #[error("Database error: {0}")]
    Database(String),

    /// Migration source (folder or archive) could not be read.
    #[error("Source error: {0}")]
    Source(String),

    /// A migration source name does not parse into an order key and name.
    #[error("Malformed migration name '{source_name}': expected '{expected}' ({reason})")]
    MalformedIdentity {
        /// The offending file or entry name.
        source_name: String,
        /// The naming convention that was expected.
        expected: &'static str,
        /// What exactly was wrong.
        reason: String,
    },

    /// Two declared migrations share one `(order key, name)` identity.
    #[error("Migration {identity} is declared more than once: '{first}' and '{second}'")]
    DuplicateIdentity {
        /// Display form of the shared identity.
        identity: String,
        /// Where the first declaration came from.
        first: String,
        /// Where the repeated declaration came from.
        second: String,
    },

    /// `migrate` was called on a database without applied-set storage.
    #[error("Migration table does not exist. Run \"init\" first")]
    NotInitialized,

    /// `init` was called on a database that already has applied-set storage.
    #[error("Database already initialized for migrations")]
    AlreadyInitialized,

    /// A procedural body is missing its closing `;`.
    #[error(
        "Function, trigger and procedure scripts must be closed with ';'. Offending statement:\n{statement}"
    )]
    UnterminatedProcedureBody {
        /// The statement that failed validation.
        statement: String,
    },

    /// The database rejected a statement.
    #[error(
        "Error occurred applying statement #{} of migration {migration}: {message}\nFailing statement:\n{statement}",
        .statement_index + 1
    )]
    StatementExecutionFailed {
        /// Display form of the migration.
        migration: String,
        /// Zero-based index of the statement within the migration.
        statement_index: usize,
        /// The statement text that was sent.
        statement: String,
        /// The underlying database message.
        message: String,
    },

    /// A migration run stopped at a failing migration.
    #[error("Execution terminated at migration {failed} ({} applied before it): {cause}", .applied.len())]
    RunAborted {
        /// Migrations applied successfully before the failure, in order.
        applied: Vec<String>,
        /// The migration whose application failed.
        failed: String,
        /// Why it failed.
        #[source]
        cause: Box<MigrationError>,
    },

    /// The backend does not support the requested capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a source error.
    pub fn source_error(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a malformed identity error.
    pub fn malformed(
        source_name: impl Into<String>,
        expected: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedIdentity {
            source_name: source_name.into(),
            expected,
            reason: reason.into(),
        }
    }

    /// The innermost error, looking through [`MigrationError::RunAborted`].
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            Self::RunAborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Migrations applied before a run was aborted, if this error ended a run.
    pub fn applied_before_failure(&self) -> &[String] {
        match self {
            Self::RunAborted { applied, .. } => applied,
            _ => &[],
        }
    }
}
