//! # dbmigrator-core
//!
//! Reconciliation engine for SQL migrations.
//!
//! This crate provides:
//! - The migration identity model (numbered and object migrations)
//! - Dialect-aware splitting of scripts into executable statements
//! - The applied-set repository contract implemented by database backends
//! - `init`, `migrate` and `status` over one database target
//! - Loading declared migrations from folders or a zip archive
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Sources      │────▶│ Engine         │◀───▶│ Applied set      │
//! └──────────────┘     └────────────────┘     │ (repository)     │
//!                              │              └──────────────────┘
//!                              ▼                       ▲
//!                      ┌────────────────┐              │
//!                      │ Splitter       │──statements──┘
//!                      └────────────────┘
//! ```
//!
//! A migration is applied when every statement derived from it executed
//! without error; only then is it written to the applied set. A run stops at
//! the first failing migration.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbmigrator_core::{EngineConfig, MigrationEngine, SkipPolicy, SourceLocations};
//!
//! fn run(repository: impl dbmigrator_core::AppliedSetRepository) -> dbmigrator_core::MigrateResult<()> {
//!     let declared = SourceLocations::default().load()?;
//!     let mut engine = MigrationEngine::new(EngineConfig::default(), repository, declared)?;
//!
//!     if !engine.is_initialized() {
//!         engine.init(SkipPolicy::Nothing)?;
//!     }
//!
//!     let summary = engine.migrate()?;
//!     println!("{}", summary.summary());
//!     println!("{}", engine.status().status_line());
//!     Ok(())
//! }
//! ```
//!
//! ## Scripts
//!
//! Statements are separated by a line holding a single `;`. Function,
//! trigger and procedure bodies keep their inner semicolons and must end
//! with `;`.

pub mod dialect;
pub mod engine;
pub mod error;
pub mod history;
pub mod migration;
pub mod script;
pub mod source;

// Re-exports
pub use dialect::Dialect;
pub use engine::{
    EngineConfig, MigrationEngine, MigrationStatus, MigrationSummary, SkipPolicy, TransactionMode,
};
pub use error::{MigrateResult, MigrationError};
pub use history::{
    AppliedSet, AppliedSetRepository, APPLIED_MIGRATIONS_TABLE, UNIQUE_CONSTRAINT_NAME,
};
pub use migration::{
    check_unique_identities, compute_fingerprint, parse_source_name, Migration, MigrationKey,
    OrderKey, NUMBERED_FINGERPRINT, NUMBERED_NAME_PATTERN, OBJECT_MIGRATION_NUM,
};
pub use script::{split_statements, validate_statement, StatementSplitter, STATEMENT_SEPARATOR};
#[cfg(feature = "archive")]
pub use source::ArchiveSource;
pub use source::{FolderSource, SourceLocations};
