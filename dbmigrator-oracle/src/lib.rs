//! Oracle Database backend for dbmigrator.
//!
//! Uses the `oracle` crate (ODPI-C), which needs Oracle client libraries at
//! run time.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbmigrator_oracle::OracleRepository;
//!
//! let repository = OracleRepository::from_connection_string(
//!     "Data Source=//db.local:1521/XEPDB1;User Id=app;Password=secret",
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod repository;

pub use config::OracleConfig;
pub use error::{OracleError, OracleResult};
pub use repository::OracleRepository;
