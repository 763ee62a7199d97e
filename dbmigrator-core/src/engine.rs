//! Reconciliation engine.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::history::{AppliedSet, AppliedSetRepository};
use crate::migration::{check_unique_identities, Migration, OrderKey};
use crate::script::StatementSplitter;

/// Which declared migrations `init` marks as applied without running them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Register nothing; every declared migration stays pending.
    #[default]
    Nothing,
    /// Register numbered migrations whose number is at most `n`.
    UpTo(u32),
    /// Register every declared migration, objects included.
    AllDeclared,
}

impl SkipPolicy {
    /// Whether the policy registers `migration` as pre-applied.
    pub fn skips(&self, migration: &Migration) -> bool {
        match (self, migration.order_key()) {
            (Self::Nothing, _) => false,
            (Self::UpTo(limit), OrderKey::Numbered(num)) => num <= *limit,
            (Self::UpTo(_), OrderKey::Object) => false,
            (Self::AllDeclared, _) => true,
        }
    }
}

/// How statements of one migration are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionMode {
    /// Each statement runs on its own; a failure leaves earlier statements in place.
    #[default]
    None,
    /// Statements and the applied-set write share one transaction.
    PerMigration,
}

/// Configuration for the migration engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Statement grouping.
    pub transaction: TransactionMode,
}

impl EngineConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transaction mode.
    pub fn transaction(mut self, mode: TransactionMode) -> Self {
        self.transaction = mode;
        self
    }
}

/// Result of a successful `migrate` run.
#[derive(Debug, Clone)]
pub struct MigrationSummary {
    /// Number of declared migrations.
    pub declared: usize,
    /// Size of the applied set before the run.
    pub applied_before: usize,
    /// Size of the applied set after the run. Objects updated in place do
    /// not grow it.
    pub applied_after: usize,
    /// Display names of the migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// Wall time of the run.
    pub duration: Duration,
}

impl MigrationSummary {
    /// Check if the run applied nothing.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if self.is_noop() {
            "No migrations applied".to_string()
        } else {
            format!(
                "{} applied in {}ms, {} of {} declared now recorded",
                self.applied.len(),
                self.duration.as_millis(),
                self.applied_after,
                self.declared
            )
        }
    }
}

/// Declared versus applied counts of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Whether applied-set storage exists.
    pub initialized: bool,
    /// Number of declared migrations.
    pub declared: usize,
    /// Number of applied records.
    pub applied: usize,
    /// Display names of pending migrations, in application order.
    pub pending: Vec<String>,
    /// Applied records with no declared counterpart.
    pub unknown: Vec<String>,
}

impl MigrationStatus {
    /// One-line status as printed after every command.
    pub fn status_line(&self) -> String {
        format!("Status: all ({}), applied ({})", self.declared, self.applied)
    }
}

enum EngineState {
    Uninitialized,
    Initialized(AppliedSet),
}

/// Reconciles declared migrations with the applied set of one target.
pub struct MigrationEngine<R: AppliedSetRepository> {
    config: EngineConfig,
    repository: R,
    splitter: StatementSplitter,
    declared: Vec<Migration>,
    state: EngineState,
}

impl<R: AppliedSetRepository> MigrationEngine<R> {
    /// Create an engine and load the target's applied set, if it has one.
    pub fn new(config: EngineConfig, repository: R, declared: Vec<Migration>) -> MigrateResult<Self> {
        let splitter = StatementSplitter::new(repository.dialect());
        let mut engine = Self {
            config,
            repository,
            splitter,
            declared,
            state: EngineState::Uninitialized,
        };
        engine.refresh()?;
        Ok(engine)
    }

    /// Reload the applied set from the repository.
    pub fn refresh(&mut self) -> MigrateResult<()> {
        self.state = if self.repository.is_initialized()? {
            let records = self.repository.load_applied()?;
            debug!(count = records.len(), "Loaded applied set");
            EngineState::Initialized(AppliedSet::from_records(records))
        } else {
            EngineState::Uninitialized
        };
        Ok(())
    }

    /// Check if the target has applied-set storage.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, EngineState::Initialized(_))
    }

    /// The applied set, when initialized.
    pub fn applied(&self) -> Option<&AppliedSet> {
        match &self.state {
            EngineState::Initialized(applied) => Some(applied),
            EngineState::Uninitialized => None,
        }
    }

    /// Declared migrations in the order they were supplied.
    pub fn declared(&self) -> &[Migration] {
        &self.declared
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Consume the engine, returning the repository.
    pub fn into_repository(self) -> R {
        self.repository
    }

    /// Pending migrations in application order.
    ///
    /// Numbered migrations come first by number; object migrations follow in
    /// declaration order.
    pub fn pending(&self) -> Vec<&Migration> {
        let mut pending: Vec<&Migration> = match &self.state {
            EngineState::Initialized(applied) => self
                .declared
                .iter()
                .filter(|m| !applied.contains(m))
                .collect(),
            EngineState::Uninitialized => self.declared.iter().collect(),
        };
        pending.sort_by_key(|m| m.order_key());
        pending
    }

    /// Create applied-set storage and register migrations chosen by `policy`
    /// as applied without executing them. Returns the number registered.
    pub fn init(&mut self, policy: SkipPolicy) -> MigrateResult<usize> {
        if self.is_initialized() {
            return Err(MigrationError::AlreadyInitialized);
        }
        check_declared(&self.declared)?;

        self.repository.create_storage()?;
        info!(db = %self.repository.target(), "Created applied-set storage");

        let mut applied = AppliedSet::new();
        let result = register_skipped(&mut self.repository, &self.declared, policy, &mut applied);
        self.state = EngineState::Initialized(applied);

        let registered = result?;
        info!(registered, ?policy, "Initialized target for migrations");
        Ok(registered)
    }

    /// Apply every pending migration, stopping at the first failure.
    ///
    /// A failure is returned as [`MigrationError::RunAborted`] carrying the
    /// migrations applied before it.
    pub fn migrate(&mut self) -> MigrateResult<MigrationSummary> {
        let applied = match &mut self.state {
            EngineState::Initialized(applied) => applied,
            EngineState::Uninitialized => return Err(MigrationError::NotInitialized),
        };
        check_declared(&self.declared)?;

        let start = Instant::now();
        let applied_before = applied.len();

        let mut pending: Vec<&Migration> = self
            .declared
            .iter()
            .filter(|m| !applied.contains(m))
            .collect();
        pending.sort_by_key(|m| m.order_key());

        if pending.is_empty() {
            info!("Database is up to date");
        } else {
            info!(count = pending.len(), "Applying pending migrations");
        }

        let mut done = Vec::new();

        for migration in pending {
            let migration_start = Instant::now();
            let is_new = !applied.contains_key(migration);

            let record = apply_migration(
                &mut self.repository,
                &self.splitter,
                self.config.transaction,
                migration,
                is_new,
            )
            .map_err(|cause| MigrationError::RunAborted {
                applied: done.clone(),
                failed: migration.to_string(),
                cause: Box::new(cause),
            })?;

            applied.insert(record);
            info!(
                %migration,
                elapsed_ms = migration_start.elapsed().as_millis() as u64,
                "Applied migration"
            );
            done.push(migration.to_string());
        }

        Ok(MigrationSummary {
            declared: self.declared.len(),
            applied_before,
            applied_after: applied.len(),
            applied: done,
            duration: start.elapsed(),
        })
    }

    /// Report declared and applied counts. Never touches the database.
    pub fn status(&self) -> MigrationStatus {
        let (applied, unknown) = match &self.state {
            EngineState::Initialized(applied) => {
                let unknown: Vec<String> = applied
                    .iter_sorted()
                    .filter(|record| {
                        !self
                            .declared
                            .iter()
                            .any(|m| m.key() == record.key())
                    })
                    .map(|record| record.to_string())
                    .collect();
                (applied.len(), unknown)
            }
            EngineState::Uninitialized => (0, Vec::new()),
        };

        for record in &unknown {
            warn!(%record, "Applied migration has no declared counterpart");
        }

        MigrationStatus {
            initialized: self.is_initialized(),
            declared: self.declared.len(),
            applied,
            pending: self.pending().iter().map(|m| m.to_string()).collect(),
            unknown,
        }
    }
}

fn check_declared(declared: &[Migration]) -> MigrateResult<()> {
    check_unique_identities(
        declared
            .iter()
            .enumerate()
            .map(|(index, m)| (format!("declaration #{} ({})", index + 1, m), m)),
    )
}

fn register_skipped<R: AppliedSetRepository>(
    repository: &mut R,
    declared: &[Migration],
    policy: SkipPolicy,
    applied: &mut AppliedSet,
) -> MigrateResult<usize> {
    let mut registered = 0;

    for migration in declared.iter().filter(|m| policy.skips(m)) {
        let record = migration.mark_applied(Utc::now());
        repository.record_applied(&record, true)?;
        debug!(%migration, "Registered as applied");
        applied.insert(record);
        registered += 1;
    }

    Ok(registered)
}

fn apply_migration<R: AppliedSetRepository>(
    repository: &mut R,
    splitter: &StatementSplitter,
    mode: TransactionMode,
    migration: &Migration,
    is_new: bool,
) -> MigrateResult<Migration> {
    // Validation happens for the whole script before anything executes.
    let statements = splitter.split(migration.content().unwrap_or_default())?;

    match mode {
        TransactionMode::None => {
            execute_and_record(repository, migration, &statements, is_new)
        }
        TransactionMode::PerMigration => {
            repository.begin_transaction()?;
            match execute_and_record(repository, migration, &statements, is_new) {
                Ok(record) => {
                    repository.commit_transaction()?;
                    Ok(record)
                }
                Err(e) => {
                    if let Err(rollback_err) = repository.rollback_transaction() {
                        warn!(%migration, error = %rollback_err, "Rollback failed");
                    }
                    Err(e)
                }
            }
        }
    }
}

fn execute_and_record<R: AppliedSetRepository>(
    repository: &mut R,
    migration: &Migration,
    statements: &[String],
    is_new: bool,
) -> MigrateResult<Migration> {
    for (index, statement) in statements.iter().enumerate() {
        debug!(%migration, index, "Executing statement");
        repository.execute_statement(statement).map_err(|e| {
            MigrationError::StatementExecutionFailed {
                migration: migration.to_string(),
                statement_index: index,
                statement: statement.clone(),
                message: match e {
                    MigrationError::Database(message) => message,
                    other => other.to_string(),
                },
            }
        })?;
    }

    let record = migration.mark_applied(Utc::now());
    repository.record_applied(&record, is_new)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct FakeRepository {
        initialized: bool,
        records: Vec<Migration>,
        executed: Vec<String>,
        writes: Vec<(String, bool)>,
        transactions: Vec<&'static str>,
        fail_on: Option<&'static str>,
        transactional: bool,
    }

    impl AppliedSetRepository for FakeRepository {
        fn dialect(&self) -> Dialect {
            Dialect::Oracle
        }

        fn target(&self) -> String {
            "fake".to_string()
        }

        fn is_initialized(&mut self) -> MigrateResult<bool> {
            Ok(self.initialized)
        }

        fn create_storage(&mut self) -> MigrateResult<()> {
            self.initialized = true;
            Ok(())
        }

        fn load_applied(&mut self) -> MigrateResult<Vec<Migration>> {
            Ok(self.records.clone())
        }

        fn record_applied(&mut self, migration: &Migration, is_new: bool) -> MigrateResult<()> {
            self.writes.push((migration.name().to_string(), is_new));
            self.records.retain(|r| r.key() != migration.key());
            self.records.push(migration.clone());
            Ok(())
        }

        fn execute_statement(&mut self, sql: &str) -> MigrateResult<()> {
            if self.fail_on == Some(sql) {
                return Err(MigrationError::database("ORA-00942: table or view does not exist"));
            }
            self.executed.push(sql.to_string());
            Ok(())
        }

        fn begin_transaction(&mut self) -> MigrateResult<()> {
            if !self.transactional {
                return Err(MigrationError::unsupported("no transactions"));
            }
            self.transactions.push("begin");
            Ok(())
        }

        fn commit_transaction(&mut self) -> MigrateResult<()> {
            self.transactions.push("commit");
            Ok(())
        }

        fn rollback_transaction(&mut self) -> MigrateResult<()> {
            self.transactions.push("rollback");
            Ok(())
        }
    }

    fn numbered(num: u32, name: &str, content: &str) -> Migration {
        Migration::numbered(num, name, content).unwrap()
    }

    fn initialized() -> FakeRepository {
        FakeRepository {
            initialized: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_skip_policy() {
        let m3 = numbered(3, "c", "");
        let m6 = numbered(6, "f", "");
        let object = Migration::object("p", "");

        assert!(!SkipPolicy::Nothing.skips(&m3));
        assert!(SkipPolicy::UpTo(5).skips(&m3));
        assert!(!SkipPolicy::UpTo(5).skips(&m6));
        assert!(SkipPolicy::UpTo(3).skips(&m3));
        assert!(!SkipPolicy::UpTo(u32::MAX).skips(&object));
        assert!(SkipPolicy::AllDeclared.skips(&object));
    }

    #[test]
    fn test_config_builder() {
        assert_eq!(EngineConfig::default().transaction, TransactionMode::None);
        let config = EngineConfig::new().transaction(TransactionMode::PerMigration);
        assert_eq!(config.transaction, TransactionMode::PerMigration);
    }

    #[test]
    fn test_migrate_requires_init() {
        let mut engine =
            MigrationEngine::new(EngineConfig::default(), FakeRepository::default(), vec![]).unwrap();
        let err = engine.migrate().unwrap_err();
        assert!(matches!(err, MigrationError::NotInitialized));
        assert!(engine.repository().executed.is_empty());
    }

    #[test]
    fn test_init_twice_fails() {
        let declared = vec![numbered(1, "a", "select 1")];
        let mut engine =
            MigrationEngine::new(EngineConfig::default(), FakeRepository::default(), declared).unwrap();

        assert_eq!(engine.init(SkipPolicy::AllDeclared).unwrap(), 1);
        let err = engine.init(SkipPolicy::AllDeclared).unwrap_err();
        assert!(matches!(err, MigrationError::AlreadyInitialized));
        assert_eq!(engine.repository().writes.len(), 1);
        assert!(engine.repository().executed.is_empty());
    }

    #[test]
    fn test_status_of_uninitialized_target() {
        let declared = vec![numbered(2, "b", ""), numbered(1, "a", "")];
        let engine =
            MigrationEngine::new(EngineConfig::default(), FakeRepository::default(), declared).unwrap();

        let status = engine.status();
        assert!(!status.initialized);
        assert_eq!(status.applied, 0);
        assert_eq!(status.pending, vec!["#1 a", "#2 b"]);
        assert_eq!(status.status_line(), "Status: all (2), applied (0)");
    }

    #[test]
    fn test_object_migration_is_updated_in_place() {
        let mut repo = initialized();
        repo.records.push(Migration::applied_record(
            OrderKey::Object,
            "proc_x",
            "old-hash",
            Utc::now(),
        ));

        let declared = vec![Migration::object("proc_x", "create or replace procedure x is begin null; end;")];
        let mut engine = MigrationEngine::new(EngineConfig::default(), repo, declared).unwrap();
        let summary = engine.migrate().unwrap();

        assert_eq!(summary.applied.len(), 1);
        assert_eq!(summary.applied_before, 1);
        assert_eq!(summary.applied_after, 1);
        assert_eq!(engine.status().applied, 1);
        assert_eq!(engine.repository().writes, vec![("proc_x".to_string(), false)]);
    }

    #[test]
    fn test_objects_after_numbered_in_declaration_order() {
        let declared = vec![
            Migration::object("z_proc", "select 'z'"),
            numbered(2, "b", "select 2"),
            Migration::object("a_proc", "select 'a'"),
            numbered(1, "a", "select 1"),
        ];
        let mut engine = MigrationEngine::new(EngineConfig::default(), initialized(), declared).unwrap();
        engine.migrate().unwrap();

        assert_eq!(
            engine.repository().executed,
            vec!["select 1", "select 2", "select 'z'", "select 'a'"]
        );
    }

    #[test]
    fn test_duplicate_declaration_fails_before_execution() {
        let declared = vec![
            numbered(1, "a", "create table t1 (id int)"),
            numbered(1, "a", "create table t2 (id int)"),
        ];
        let mut engine = MigrationEngine::new(EngineConfig::default(), initialized(), declared).unwrap();

        let err = engine.migrate().unwrap_err();
        match err {
            MigrationError::DuplicateIdentity {
                identity,
                first,
                second,
            } => {
                assert_eq!(identity, "#1 a");
                assert_eq!(first, "declaration #1 (#1 a)");
                assert_eq!(second, "declaration #2 (#1 a)");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.repository().executed.is_empty());
        assert!(engine.repository().writes.is_empty());
    }

    #[test]
    fn test_duplicate_object_fails_init_without_storage() {
        let declared = vec![
            Migration::object("p.sql", "create view v1 as select 1"),
            Migration::object("p.sql", "create view v2 as select 2"),
        ];
        let mut engine =
            MigrationEngine::new(EngineConfig::default(), FakeRepository::default(), declared).unwrap();

        let err = engine.init(SkipPolicy::AllDeclared).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateIdentity { .. }));
        assert!(!engine.is_initialized());
        assert!(engine.repository().writes.is_empty());
    }

    #[test]
    fn test_per_migration_transaction_commits() {
        let mut repo = initialized();
        repo.transactional = true;
        let declared = vec![numbered(1, "a", "select 1\n;\nselect 2")];

        let config = EngineConfig::new().transaction(TransactionMode::PerMigration);
        let mut engine = MigrationEngine::new(config, repo, declared).unwrap();
        engine.migrate().unwrap();

        assert_eq!(engine.repository().transactions, vec!["begin", "commit"]);
    }

    #[test]
    fn test_per_migration_transaction_rolls_back() {
        let mut repo = initialized();
        repo.transactional = true;
        repo.fail_on = Some("select 2");
        let declared = vec![numbered(1, "a", "select 1\n;\nselect 2")];

        let config = EngineConfig::new().transaction(TransactionMode::PerMigration);
        let mut engine = MigrationEngine::new(config, repo, declared).unwrap();
        let err = engine.migrate().unwrap_err();

        assert!(matches!(
            err.root_cause(),
            MigrationError::StatementExecutionFailed { statement_index: 1, .. }
        ));
        assert_eq!(engine.repository().transactions, vec!["begin", "rollback"]);
        assert!(engine.repository().writes.is_empty());
        assert_eq!(engine.status().applied, 0);
    }

    #[test]
    fn test_per_migration_requires_backend_support() {
        let declared = vec![numbered(1, "a", "select 1")];
        let config = EngineConfig::new().transaction(TransactionMode::PerMigration);
        let mut engine = MigrationEngine::new(config, initialized(), declared).unwrap();

        let err = engine.migrate().unwrap_err();
        assert!(matches!(err.root_cause(), MigrationError::Unsupported(_)));
        assert!(engine.repository().executed.is_empty());
    }

    #[test]
    fn test_status_reports_unknown_records() {
        let mut repo = initialized();
        repo.records.push(Migration::applied_record(
            OrderKey::Numbered(7),
            "dropped",
            crate::migration::NUMBERED_FINGERPRINT,
            Utc::now(),
        ));
        let engine =
            MigrationEngine::new(EngineConfig::default(), repo, vec![numbered(1, "a", "")]).unwrap();

        let status = engine.status();
        assert_eq!(status.applied, 1);
        assert_eq!(status.unknown, vec!["#7 dropped"]);
        assert_eq!(status.pending, vec!["#1 a"]);
    }

    #[test]
    fn test_summary_text() {
        let summary = MigrationSummary {
            declared: 3,
            applied_before: 1,
            applied_after: 3,
            applied: vec!["#2 b".into(), "#3 c".into()],
            duration: Duration::from_millis(12),
        };
        assert!(!summary.is_noop());
        assert_eq!(summary.summary(), "2 applied in 12ms, 3 of 3 declared now recorded");
    }

    #[test]
    fn test_summary_counts_in_place_updates_once() {
        let summary = MigrationSummary {
            declared: 1,
            applied_before: 1,
            applied_after: 1,
            applied: vec!["p.sql (h2)".into()],
            duration: Duration::from_millis(3),
        };
        assert_eq!(summary.summary(), "1 applied in 3ms, 1 of 1 declared now recorded");
    }
}
