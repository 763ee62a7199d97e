//! Microsoft SQL Server backend for dbmigrator.
//!
//! Connects with `tiberius` and answers every
//! [`AppliedSetRepository`](dbmigrator_core::AppliedSetRepository) call
//! synchronously.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbmigrator_mssql::MssqlRepository;
//!
//! let repository = MssqlRepository::from_connection_string(
//!     "Server=localhost;Database=app;User Id=sa;Password=secret;TrustServerCertificate=true",
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod repository;

pub use config::{EncryptionMode, MssqlConfig};
pub use error::{MssqlError, MssqlResult};
pub use repository::MssqlRepository;
