//! Applied-set repository backed by a SQLite connection.

use chrono::{DateTime, Utc};
use dbmigrator_core::{
    AppliedSetRepository, Dialect, MigrateResult, Migration, OrderKey, APPLIED_MIGRATIONS_TABLE,
    UNIQUE_CONSTRAINT_NAME,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, trace};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};

/// SQLite execution transport and applied-set storage.
pub struct SqliteRepository {
    conn: Connection,
    target: String,
}

impl SqliteRepository {
    /// Open the database described by `config`.
    pub fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory()?,
            DatabasePath::File(path) => Connection::open(path)?,
        };
        conn.execute_batch(&config.init_sql())?;

        debug!(path = %config.path.display_name(), "Opened SQLite database");
        Ok(Self {
            conn,
            target: config.path.display_name(),
        })
    }

    /// Open a database from a URL or path.
    pub fn from_url(url: &str) -> SqliteResult<Self> {
        Self::open(&SqliteConfig::from_url(url)?)
    }

    /// Open a fresh in-memory database.
    pub fn memory() -> SqliteResult<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, target: impl Into<String>) -> Self {
        Self {
            conn,
            target: target.into(),
        }
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table_exists(&self) -> SqliteResult<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![APPLIED_MIGRATIONS_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_table(&self) -> SqliteResult<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE {table} (\n\
             \x20   num varchar(20) NOT NULL,\n\
             \x20   hash varchar(32) NOT NULL,\n\
             \x20   name varchar(100) NOT NULL,\n\
             \x20   applied_date timestamp NOT NULL,\n\
             \x20   CONSTRAINT {constraint} UNIQUE (num, name)\n\
             )",
            table = APPLIED_MIGRATIONS_TABLE,
            constraint = UNIQUE_CONSTRAINT_NAME,
        ))?;
        Ok(())
    }

    fn select_applied(&self) -> SqliteResult<Vec<(String, String, String, DateTime<Utc>)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT num, hash, name, applied_date FROM {} ORDER BY applied_date",
            APPLIED_MIGRATIONS_TABLE
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;

        let results: Result<Vec<_>, _> = rows.collect();
        Ok(results?)
    }

    fn write_record(&self, migration: &Migration, is_new: bool) -> SqliteResult<()> {
        let num = migration.order_key().to_stored();
        let applied_at = migration.applied_at().unwrap_or_else(Utc::now);

        if is_new {
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (num, hash, name, applied_date) VALUES (?1, ?2, ?3, ?4)",
                    APPLIED_MIGRATIONS_TABLE
                ),
                params![num, migration.fingerprint(), migration.name(), applied_at],
            )
            .map_err(|e| match SqliteError::from(e) {
                err if err.is_unique_violation() => SqliteError::DuplicateRecord {
                    num: num.clone(),
                    name: migration.name().to_string(),
                },
                err => err,
            })?;
            return Ok(());
        }

        let updated = self.conn.execute(
            &format!(
                "UPDATE {} SET hash = ?1, applied_date = ?2 WHERE num = ?3 AND name = ?4",
                APPLIED_MIGRATIONS_TABLE
            ),
            params![migration.fingerprint(), applied_at, num, migration.name()],
        )?;

        if updated == 0 {
            return Err(SqliteError::MissingRecord {
                num,
                name: migration.name().to_string(),
            });
        }
        Ok(())
    }
}

impl AppliedSetRepository for SqliteRepository {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    fn is_initialized(&mut self) -> MigrateResult<bool> {
        Ok(self.table_exists()?)
    }

    fn create_storage(&mut self) -> MigrateResult<()> {
        Ok(self.create_table()?)
    }

    fn load_applied(&mut self) -> MigrateResult<Vec<Migration>> {
        self.select_applied()?
            .into_iter()
            .map(|(num, hash, name, applied_at)| {
                Ok(Migration::applied_record(
                    OrderKey::from_stored(&num)?,
                    name,
                    hash,
                    applied_at,
                ))
            })
            .collect()
    }

    fn record_applied(&mut self, migration: &Migration, is_new: bool) -> MigrateResult<()> {
        Ok(self.write_record(migration, is_new)?)
    }

    fn execute_statement(&mut self, sql: &str) -> MigrateResult<()> {
        trace!(sql = %sql, "Executing statement");
        self.conn.execute_batch(sql).map_err(SqliteError::from)?;
        Ok(())
    }

    fn begin_transaction(&mut self) -> MigrateResult<()> {
        self.conn.execute_batch("BEGIN").map_err(SqliteError::from)?;
        Ok(())
    }

    fn commit_transaction(&mut self) -> MigrateResult<()> {
        self.conn.execute_batch("COMMIT").map_err(SqliteError::from)?;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> MigrateResult<()> {
        self.conn.execute_batch("ROLLBACK").map_err(SqliteError::from)?;
        Ok(())
    }
}
