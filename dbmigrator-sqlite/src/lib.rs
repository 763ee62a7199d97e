//! SQLite backend for dbmigrator.
//!
//! Implements [`AppliedSetRepository`](dbmigrator_core::AppliedSetRepository)
//! on a blocking `rusqlite` connection. Statements run through
//! `execute_batch`, so a statement may hold several SQL commands.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbmigrator_core::{EngineConfig, MigrationEngine, SkipPolicy};
//! use dbmigrator_sqlite::SqliteRepository;
//!
//! let repository = SqliteRepository::from_url("sqlite://./app.db")?;
//! let mut engine = MigrationEngine::new(EngineConfig::default(), repository, declared)?;
//! engine.init(SkipPolicy::Nothing)?;
//! engine.migrate()?;
//! ```

pub mod config;
pub mod error;
pub mod repository;

pub use config::{DatabasePath, SqliteConfig};
pub use error::{SqliteError, SqliteResult};
pub use repository::SqliteRepository;
