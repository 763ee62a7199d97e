//! Applied-set tracking.
//!
//! The applied set lives in one table per database, keyed by
//! `(num, name)` with the content fingerprint and the application time.
//! Backends provide it through [`AppliedSetRepository`]; the engine keeps an
//! in-memory [`AppliedSet`] mirror for the current run.

use std::collections::HashMap;

use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};
use crate::migration::{Migration, MigrationKey};

/// Name of the applied-set table.
pub const APPLIED_MIGRATIONS_TABLE: &str = "applied_migrations";

/// Name of the `(num, name)` unique constraint.
pub const UNIQUE_CONSTRAINT_NAME: &str = "mig_unique_num_name";

/// Storage and execution capability of one database target.
///
/// Every call blocks until the database answers.
pub trait AppliedSetRepository {
    /// Dialect of the target database.
    fn dialect(&self) -> Dialect;

    /// Human-readable name of the target (database or file name).
    fn target(&self) -> String;

    /// Check whether the applied-set table exists.
    fn is_initialized(&mut self) -> MigrateResult<bool>;

    /// Create the applied-set table and its unique constraint.
    fn create_storage(&mut self) -> MigrateResult<()>;

    /// Load every applied record.
    fn load_applied(&mut self) -> MigrateResult<Vec<Migration>>;

    /// Insert (`is_new`) or update the record of an applied migration.
    fn record_applied(&mut self, migration: &Migration, is_new: bool) -> MigrateResult<()>;

    /// Execute one statement.
    fn execute_statement(&mut self, sql: &str) -> MigrateResult<()>;

    /// Start a transaction spanning the following calls.
    fn begin_transaction(&mut self) -> MigrateResult<()> {
        Err(MigrationError::unsupported(format!(
            "{} backend does not support transactional migrations",
            self.dialect()
        )))
    }

    /// Commit the open transaction.
    fn commit_transaction(&mut self) -> MigrateResult<()> {
        Err(MigrationError::unsupported(format!(
            "{} backend does not support transactional migrations",
            self.dialect()
        )))
    }

    /// Roll back the open transaction.
    fn rollback_transaction(&mut self) -> MigrateResult<()> {
        Err(MigrationError::unsupported(format!(
            "{} backend does not support transactional migrations",
            self.dialect()
        )))
    }
}

impl<R: AppliedSetRepository + ?Sized> AppliedSetRepository for Box<R> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn target(&self) -> String {
        (**self).target()
    }

    fn is_initialized(&mut self) -> MigrateResult<bool> {
        (**self).is_initialized()
    }

    fn create_storage(&mut self) -> MigrateResult<()> {
        (**self).create_storage()
    }

    fn load_applied(&mut self) -> MigrateResult<Vec<Migration>> {
        (**self).load_applied()
    }

    fn record_applied(&mut self, migration: &Migration, is_new: bool) -> MigrateResult<()> {
        (**self).record_applied(migration, is_new)
    }

    fn execute_statement(&mut self, sql: &str) -> MigrateResult<()> {
        (**self).execute_statement(sql)
    }

    fn begin_transaction(&mut self) -> MigrateResult<()> {
        (**self).begin_transaction()
    }

    fn commit_transaction(&mut self) -> MigrateResult<()> {
        (**self).commit_transaction()
    }

    fn rollback_transaction(&mut self) -> MigrateResult<()> {
        (**self).rollback_transaction()
    }
}

/// In-memory view of the applied set, keyed by `(order key, name)`.
#[derive(Debug, Clone, Default)]
pub struct AppliedSet {
    records: HashMap<MigrationKey, Migration>,
}

impl AppliedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from loaded records. Later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = Migration>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.insert(record);
        }
        set
    }

    /// Whether an equal migration (same key and fingerprint) was applied.
    pub fn contains(&self, migration: &Migration) -> bool {
        self.records
            .get(&migration.key())
            .is_some_and(|record| record == migration)
    }

    /// Whether any migration with the same `(order key, name)` was applied.
    pub fn contains_key(&self, migration: &Migration) -> bool {
        self.records.contains_key(&migration.key())
    }

    /// Insert or replace the record for the migration's key.
    pub fn insert(&mut self, migration: Migration) -> Option<Migration> {
        self.records.insert(migration.key(), migration)
    }

    /// Number of applied records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing was applied.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in order-key order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Migration> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        records.into_iter()
    }
}
