//! Opening the applied-set repository for a configured dialect.

use dbmigrator_core::{AppliedSetRepository, Dialect};
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Boxed repository of any compiled-in backend.
pub type DynRepository = Box<dyn AppliedSetRepository>;

/// Connect to `url` with the backend for `dialect`.
pub fn open_repository(dialect: Dialect, url: &str) -> CliResult<DynRepository> {
    debug!(dialect = %dialect, "Opening repository");

    match dialect {
        Dialect::Sqlite => open_sqlite(url),
        Dialect::Mssql => open_mssql(url),
        Dialect::Oracle => open_oracle(url),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(url: &str) -> CliResult<DynRepository> {
    let repository = dbmigrator_sqlite::SqliteRepository::from_url(url)
        .map_err(|e| CliError::database(e.to_string()))?;
    Ok(Box::new(repository))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_url: &str) -> CliResult<DynRepository> {
    Err(CliError::Unsupported(Dialect::Sqlite.to_string()))
}

#[cfg(feature = "mssql")]
fn open_mssql(url: &str) -> CliResult<DynRepository> {
    let repository = dbmigrator_mssql::MssqlRepository::from_connection_string(url)
        .map_err(|e| CliError::database(e.to_string()))?;
    Ok(Box::new(repository))
}

#[cfg(not(feature = "mssql"))]
fn open_mssql(_url: &str) -> CliResult<DynRepository> {
    Err(CliError::Unsupported(Dialect::Mssql.to_string()))
}

#[cfg(feature = "oracle")]
fn open_oracle(url: &str) -> CliResult<DynRepository> {
    let repository = dbmigrator_oracle::OracleRepository::from_connection_string(url)
        .map_err(|e| CliError::database(e.to_string()))?;
    Ok(Box::new(repository))
}

#[cfg(not(feature = "oracle"))]
fn open_oracle(_url: &str) -> CliResult<DynRepository> {
    Err(CliError::Unsupported(Dialect::Oracle.to_string()))
}
