//! dbmigrator CLI - applies versioned SQL migrations to a named environment.
//!
//! This crate provides the `dbmigrator` binary: configuration lookup,
//! backend selection and the `init`, `migrate` and `status` commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod connect;
pub mod error;
pub mod logging;
pub mod output;
