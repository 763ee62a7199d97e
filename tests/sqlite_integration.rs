//! End-to-end runs against an in-memory SQLite database.

#![cfg(feature = "sqlite")]

use dbmigrator::core::{
    EngineConfig, Migration, MigrationEngine, MigrationError, SkipPolicy, TransactionMode,
};
use dbmigrator::sqlite::SqliteRepository;
use pretty_assertions::assert_eq;

fn table_exists(engine: &MigrationEngine<SqliteRepository>, name: &str) -> bool {
    engine
        .repository()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
        > 0
}

fn stored_rows(engine: &MigrationEngine<SqliteRepository>) -> Vec<(String, String, String)> {
    let conn = engine.repository().connection();
    let mut stmt = conn
        .prepare("SELECT num, name, hash FROM applied_migrations ORDER BY num, name")
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn declared() -> Vec<Migration> {
    vec![
        Migration::from_source_name(
            "0001_create_orders.sql",
            "create table orders (id integer primary key, total real)\n;\ncreate index ix_orders_total on orders(total)",
        )
        .unwrap(),
        Migration::from_source_name(
            "0002_create_items.sql",
            "-- line items\ncreate table items (order_id integer, sku text)",
        )
        .unwrap(),
        Migration::object(
            "v_order_totals.sql",
            "drop view if exists v_order_totals\n;\ncreate view v_order_totals as select id, total from orders",
        ),
    ]
}

#[test]
fn test_full_lifecycle() {
    let repository = SqliteRepository::memory().unwrap();
    let mut engine = MigrationEngine::new(EngineConfig::default(), repository, declared()).unwrap();

    assert!(!engine.is_initialized());
    assert_eq!(engine.init(SkipPolicy::Nothing).unwrap(), 0);
    assert!(table_exists(&engine, "applied_migrations"));

    let summary = engine.migrate().unwrap();
    assert_eq!(
        summary.applied,
        vec![
            "#1 create_orders".to_string(),
            "#2 create_items".to_string(),
            declared()[2].to_string(),
        ]
    );
    assert!(table_exists(&engine, "orders"));
    assert!(table_exists(&engine, "ix_orders_total"));
    assert!(table_exists(&engine, "items"));
    assert!(table_exists(&engine, "v_order_totals"));

    let rows = stored_rows(&engine);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0, "1");
    assert_eq!(rows[2].0, "9999");
    assert_eq!(rows[2].2, declared()[2].fingerprint());

    assert!(engine.migrate().unwrap().is_noop());
    assert_eq!(engine.status().status_line(), "Status: all (3), applied (3)");
}

#[test]
fn test_changed_object_updates_stored_fingerprint() {
    let repository = SqliteRepository::memory().unwrap();
    let mut engine = MigrationEngine::new(EngineConfig::default(), repository, declared()).unwrap();
    engine.init(SkipPolicy::Nothing).unwrap();
    engine.migrate().unwrap();

    let mut redeclared = declared();
    redeclared[2] = Migration::object(
        "v_order_totals.sql",
        "drop view if exists v_order_totals\n;\ncreate view v_order_totals as select id, total * 2 as total from orders",
    );
    let new_fingerprint = redeclared[2].fingerprint().to_string();

    let repository = engine.into_repository();
    let mut engine = MigrationEngine::new(EngineConfig::default(), repository, redeclared).unwrap();
    assert_eq!(engine.pending().len(), 1);

    let summary = engine.migrate().unwrap();
    assert_eq!(summary.applied.len(), 1);
    assert_eq!(summary.applied_before, 3);
    assert_eq!(summary.applied_after, 3);

    let rows = stored_rows(&engine);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].2, new_fingerprint);
}

#[test]
fn test_failure_without_transaction_keeps_earlier_statements() {
    let repository = SqliteRepository::memory().unwrap();
    let broken = vec![Migration::from_source_name(
        "0001_partial.sql",
        "create table partial (id integer)\n;\ninsert into missing_table values (1)",
    )
    .unwrap()];
    let mut engine = MigrationEngine::new(EngineConfig::default(), repository, broken).unwrap();
    engine.init(SkipPolicy::Nothing).unwrap();

    let err = engine.migrate().unwrap_err();
    match err.root_cause() {
        MigrationError::StatementExecutionFailed {
            statement_index,
            message,
            ..
        } => {
            assert_eq!(*statement_index, 1);
            assert!(message.contains("no such table: missing_table"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(table_exists(&engine, "partial"));
    assert!(stored_rows(&engine).is_empty());
}

#[test]
fn test_failure_in_transaction_rolls_back_migration() {
    let repository = SqliteRepository::memory().unwrap();
    let declared = vec![
        Migration::from_source_name("0001_ok.sql", "create table ok (id integer)").unwrap(),
        Migration::from_source_name(
            "0002_partial.sql",
            "create table partial (id integer)\n;\ninsert into missing_table values (1)",
        )
        .unwrap(),
    ];
    let config = EngineConfig::new().transaction(TransactionMode::PerMigration);
    let mut engine = MigrationEngine::new(config, repository, declared).unwrap();
    engine.init(SkipPolicy::Nothing).unwrap();

    let err = engine.migrate().unwrap_err();
    assert_eq!(err.applied_before_failure(), ["#1 ok".to_string()]);

    assert!(table_exists(&engine, "ok"));
    assert!(!table_exists(&engine, "partial"));

    let rows = stored_rows(&engine);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, "ok");
}

#[test]
fn test_init_skip_all_registers_without_running() {
    let repository = SqliteRepository::memory().unwrap();
    let mut engine = MigrationEngine::new(EngineConfig::default(), repository, declared()).unwrap();

    assert_eq!(engine.init(SkipPolicy::AllDeclared).unwrap(), 3);
    assert!(!table_exists(&engine, "orders"));
    assert_eq!(stored_rows(&engine).len(), 3);
    assert!(engine.migrate().unwrap().is_noop());
}

#[test]
fn test_reopened_database_is_initialized() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("app.db");
    let url = format!("sqlite://{}", path.display());

    let numbered_only: Vec<_> = declared().into_iter().take(2).collect();

    {
        let repository = SqliteRepository::from_url(&url).unwrap();
        let mut engine =
            MigrationEngine::new(EngineConfig::default(), repository, numbered_only.clone())
                .unwrap();
        engine.init(SkipPolicy::UpTo(1)).unwrap();
        engine.migrate().unwrap();
    }

    let repository = SqliteRepository::from_url(&url).unwrap();
    let engine = MigrationEngine::new(EngineConfig::default(), repository, numbered_only).unwrap();
    assert!(engine.is_initialized());
    assert!(engine.pending().is_empty());
    // #1 was registered by init and never executed.
    assert!(!table_exists(&engine, "orders"));
    assert!(table_exists(&engine, "items"));
    assert_eq!(engine.applied().map(|a| a.len()), Some(2));
}
