//! Applied-set repository backed by a SQL Server connection.
//!
//! Tiberius is async; every call is driven to completion on a private
//! current-thread runtime owned by the repository.

use chrono::{NaiveDateTime, Utc};
use dbmigrator_core::{
    AppliedSetRepository, Dialect, MigrateResult, Migration, OrderKey, APPLIED_MIGRATIONS_TABLE,
    UNIQUE_CONSTRAINT_NAME,
};
use tiberius::{Client, Row};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, trace};

use crate::config::MssqlConfig;
use crate::error::{MssqlError, MssqlResult};

type MssqlClient = Client<Compat<TcpStream>>;

/// SQL Server execution transport and applied-set storage.
pub struct MssqlRepository {
    runtime: Runtime,
    client: MssqlClient,
    target: String,
}

impl MssqlRepository {
    /// Connect to the server described by `config`.
    pub fn connect(config: &MssqlConfig) -> MssqlResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let client = runtime.block_on(open_client(config))?;
        debug!(host = %config.host, database = %config.database, "Connected to SQL Server");

        Ok(Self {
            runtime,
            client,
            target: config.display_target(),
        })
    }

    /// Connect using an ADO.NET style or URL connection string.
    pub fn from_connection_string(conn_str: &str) -> MssqlResult<Self> {
        Self::connect(&MssqlConfig::from_connection_string(conn_str)?)
    }

    fn simple(&mut self, sql: &str) -> MssqlResult<()> {
        let client = &mut self.client;
        self.runtime.block_on(async move {
            client.simple_query(sql).await?.into_results().await?;
            Ok(())
        })
    }

    fn query(&mut self, sql: &str, params: &[&dyn tiberius::ToSql]) -> MssqlResult<Vec<Row>> {
        let client = &mut self.client;
        self.runtime.block_on(async move {
            let stream = client.query(sql, params).await?;
            Ok(stream.into_first_result().await?)
        })
    }

    fn execute(&mut self, sql: &str, params: &[&dyn tiberius::ToSql]) -> MssqlResult<u64> {
        let client = &mut self.client;
        self.runtime.block_on(async move {
            let result = client.execute(sql, params).await?;
            Ok(result.total())
        })
    }

    fn table_exists(&mut self) -> MssqlResult<bool> {
        let rows = self.query(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = @P1",
            &[&APPLIED_MIGRATIONS_TABLE],
        )?;

        let count: i32 = rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()?
            .flatten()
            .ok_or_else(|| MssqlError::deserialization("catalog query returned no rows"))?;
        Ok(count > 0)
    }

    fn select_applied(&mut self) -> MssqlResult<Vec<Migration>> {
        let rows = self.query(
            &format!(
                "SELECT num, hash, name, applied_date FROM {} ORDER BY applied_date",
                APPLIED_MIGRATIONS_TABLE
            ),
            &[],
        )?;

        rows.iter().map(decode_record).collect()
    }

    fn write_record(&mut self, migration: &Migration, is_new: bool) -> MssqlResult<()> {
        let num = migration.order_key().to_stored();
        let hash = migration.fingerprint().to_string();
        let name = migration.name().to_string();
        let applied_at = migration.applied_at().unwrap_or_else(Utc::now).naive_utc();

        if is_new {
            self.execute(
                &format!(
                    "INSERT INTO {} (num, hash, name, applied_date) VALUES (@P1, @P2, @P3, @P4)",
                    APPLIED_MIGRATIONS_TABLE
                ),
                &[&num, &hash, &name, &applied_at],
            )
            .map_err(|err| {
                if err.is_unique_violation() {
                    MssqlError::DuplicateRecord {
                        num: num.clone(),
                        name: name.clone(),
                    }
                } else {
                    err
                }
            })?;
        } else {
            self.execute(
                &format!(
                    "UPDATE {} SET hash = @P1, applied_date = @P2 WHERE num = @P3 AND name = @P4",
                    APPLIED_MIGRATIONS_TABLE
                ),
                &[&hash, &applied_at, &num, &name],
            )?;
        }
        Ok(())
    }
}

async fn open_client(config: &MssqlConfig) -> MssqlResult<MssqlClient> {
    let tiberius_config = config.to_tiberius_config()?;
    let timeout_ms = config.connect_timeout.as_millis() as u64;

    let connect = async {
        let tcp = TcpStream::connect(tiberius_config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Ok::<_, MssqlError>(Client::connect(tiberius_config, tcp.compat_write()).await?)
    };

    tokio::time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| MssqlError::Timeout(timeout_ms))?
}

fn decode_record(row: &Row) -> MssqlResult<Migration> {
    let text = |index: usize| -> MssqlResult<String> {
        row.try_get::<&str, _>(index)?
            .map(String::from)
            .ok_or_else(|| MssqlError::deserialization(format!("column {} is null", index)))
    };

    let applied_at: NaiveDateTime = row
        .try_get(3)?
        .ok_or_else(|| MssqlError::deserialization("applied_date is null"))?;

    record_from_columns(&text(0)?, &text(1)?, &text(2)?, applied_at)
}

/// Build an applied record from the stored column values.
fn record_from_columns(
    num: &str,
    hash: &str,
    name: &str,
    applied_at: NaiveDateTime,
) -> MssqlResult<Migration> {
    let order_key =
        OrderKey::from_stored(num).map_err(|e| MssqlError::deserialization(e.to_string()))?;

    Ok(Migration::applied_record(
        order_key,
        name,
        hash,
        applied_at.and_utc(),
    ))
}

impl AppliedSetRepository for MssqlRepository {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    fn is_initialized(&mut self) -> MigrateResult<bool> {
        Ok(self.table_exists()?)
    }

    fn create_storage(&mut self) -> MigrateResult<()> {
        self.simple(&format!(
            "CREATE TABLE {table} (\n\
             \x20   num varchar(20) NOT NULL,\n\
             \x20   hash varchar(32) NOT NULL,\n\
             \x20   name varchar(100) NOT NULL,\n\
             \x20   applied_date datetime2 NOT NULL,\n\
             \x20   CONSTRAINT {constraint} UNIQUE (num, name)\n\
             )",
            table = APPLIED_MIGRATIONS_TABLE,
            constraint = UNIQUE_CONSTRAINT_NAME,
        ))?;
        Ok(())
    }

    fn load_applied(&mut self) -> MigrateResult<Vec<Migration>> {
        Ok(self.select_applied()?)
    }

    fn record_applied(&mut self, migration: &Migration, is_new: bool) -> MigrateResult<()> {
        Ok(self.write_record(migration, is_new)?)
    }

    fn execute_statement(&mut self, sql: &str) -> MigrateResult<()> {
        trace!(sql = %sql, "Executing statement");
        Ok(self.simple(sql)?)
    }

    fn begin_transaction(&mut self) -> MigrateResult<()> {
        debug!("Beginning transaction");
        Ok(self.simple("BEGIN TRANSACTION")?)
    }

    fn commit_transaction(&mut self) -> MigrateResult<()> {
        debug!("Committing transaction");
        Ok(self.simple("COMMIT")?)
    }

    fn rollback_transaction(&mut self) -> MigrateResult<()> {
        debug!("Rolling back transaction");
        Ok(self.simple("ROLLBACK")?)
    }
}
