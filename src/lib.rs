//! # dbmigrator
//!
//! Applies versioned SQL migrations to a database exactly once.
//!
//! dbmigrator provides:
//! - Numbered migrations applied once in ascending order
//! - Object migrations (procedures, views, triggers) re-applied whenever their
//!   content changes
//! - Dialect-aware statement splitting for SQL Server, Oracle and SQLite
//! - An applied-set table recording what ran and when
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbmigrator::prelude::*;
//! use dbmigrator::sqlite::SqliteRepository;
//!
//! fn main() -> Result<(), MigrationError> {
//!     let repository = SqliteRepository::from_url("sqlite://app.db")?;
//!     let declared = SourceLocations::default().load()?;
//!     let mut engine = MigrationEngine::new(EngineConfig::default(), repository, declared)?;
//!
//!     if !engine.is_initialized() {
//!         engine.init(SkipPolicy::Nothing)?;
//!     }
//!     let summary = engine.migrate()?;
//!     println!("{}", summary.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Identity model, splitter and reconciliation engine.
pub mod core {
    pub use dbmigrator_core::*;
}

/// SQLite backend.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use dbmigrator_sqlite::*;
}

/// SQL Server backend.
#[cfg(feature = "mssql")]
pub mod mssql {
    pub use dbmigrator_mssql::*;
}

/// Oracle backend.
#[cfg(feature = "oracle")]
pub mod oracle {
    pub use dbmigrator_oracle::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        AppliedSetRepository, Dialect, EngineConfig, MigrateResult, Migration, MigrationEngine,
        MigrationError, MigrationStatus, MigrationSummary, SkipPolicy, SourceLocations,
        TransactionMode,
    };
}

// Re-export key types at the crate root
pub use dbmigrator_core::{MigrateResult, Migration, MigrationEngine, MigrationError};
