//! Applied-set repository backed by an Oracle connection.
//!
//! Oracle commits DDL implicitly, so statements run one by one and each is
//! committed right away. Transactional migrations are not offered.

use chrono::{NaiveDateTime, Utc};
use dbmigrator_core::{
    AppliedSetRepository, Dialect, MigrateResult, Migration, OrderKey, APPLIED_MIGRATIONS_TABLE,
    UNIQUE_CONSTRAINT_NAME,
};
use oracle::Connection;
use tracing::{debug, trace};

use crate::config::OracleConfig;
use crate::error::{OracleError, OracleResult};

/// Oracle execution transport and applied-set storage.
pub struct OracleRepository {
    conn: Connection,
    target: String,
}

impl OracleRepository {
    /// Connect to the database described by `config`.
    pub fn connect(config: &OracleConfig) -> OracleResult<Self> {
        let conn = Connection::connect(&config.username, &config.password, &config.connect_string)?;
        debug!(target_db = %config.connect_string, "Connected to Oracle");

        Ok(Self {
            conn,
            target: config.display_target(),
        })
    }

    /// Connect using an ADO.NET style or URL connection string.
    pub fn from_connection_string(conn_str: &str) -> OracleResult<Self> {
        Self::connect(&OracleConfig::from_connection_string(conn_str)?)
    }

    fn table_exists(&self) -> OracleResult<bool> {
        let count = self.conn.query_row_as::<i64>(
            "SELECT COUNT(*) FROM user_tables WHERE table_name = UPPER(:1)",
            &[&APPLIED_MIGRATIONS_TABLE],
        )?;
        Ok(count > 0)
    }

    fn create_table(&self) -> OracleResult<()> {
        self.conn.execute(
            &format!(
                "CREATE TABLE {} (\n\
                 \x20   num varchar(20) NOT NULL,\n\
                 \x20   hash varchar(32) NOT NULL,\n\
                 \x20   name varchar(100) NOT NULL,\n\
                 \x20   applied_date timestamp(6) NOT NULL\n\
                 )",
                APPLIED_MIGRATIONS_TABLE
            ),
            &[],
        )?;
        self.conn.execute(
            &format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE (num, name)",
                APPLIED_MIGRATIONS_TABLE, UNIQUE_CONSTRAINT_NAME
            ),
            &[],
        )?;
        Ok(())
    }

    fn select_applied(&self) -> OracleResult<Vec<Migration>> {
        let rows = self.conn.query_as::<(String, String, String, NaiveDateTime)>(
            &format!(
                "SELECT num, hash, name, applied_date FROM {} ORDER BY applied_date",
                APPLIED_MIGRATIONS_TABLE
            ),
            &[],
        )?;

        let mut records = Vec::new();
        for row in rows {
            let (num, hash, name, applied_at) = row?;
            records.push(record_from_columns(&num, &hash, &name, applied_at)?);
        }
        Ok(records)
    }

    fn write_record(&self, migration: &Migration, is_new: bool) -> OracleResult<()> {
        let num = migration.order_key().to_stored();
        let applied_at = migration.applied_at().unwrap_or_else(Utc::now).naive_utc();

        if is_new {
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (num, hash, name, applied_date) VALUES (:1, :2, :3, :4)",
                    APPLIED_MIGRATIONS_TABLE
                ),
                &[&num, &migration.fingerprint(), &migration.name(), &applied_at],
            )?;
        } else {
            self.conn.execute(
                &format!(
                    "UPDATE {} SET hash = :1, applied_date = :2 WHERE num = :3 AND name = :4",
                    APPLIED_MIGRATIONS_TABLE
                ),
                &[&migration.fingerprint(), &applied_at, &num, &migration.name()],
            )?;
        }
        self.conn.commit()?;
        Ok(())
    }

    fn execute_and_commit(&self, sql: &str) -> OracleResult<()> {
        self.conn.execute(sql, &[])?;
        self.conn.commit()?;
        Ok(())
    }
}

/// Build an applied record from the stored column values.
fn record_from_columns(
    num: &str,
    hash: &str,
    name: &str,
    applied_at: NaiveDateTime,
) -> OracleResult<Migration> {
    let order_key =
        OrderKey::from_stored(num).map_err(|e| OracleError::deserialization(e.to_string()))?;

    Ok(Migration::applied_record(
        order_key,
        name,
        hash,
        applied_at.and_utc(),
    ))
}

impl AppliedSetRepository for OracleRepository {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
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
        Ok(self.select_applied()?)
    }

    fn record_applied(&mut self, migration: &Migration, is_new: bool) -> MigrateResult<()> {
        Ok(self.write_record(migration, is_new)?)
    }

    fn execute_statement(&mut self, sql: &str) -> MigrateResult<()> {
        trace!(sql = %sql, "Executing statement");
        Ok(self.execute_and_commit(sql)?)
    }
}
