//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use dbmigrator_core::SkipPolicy;
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// dbmigrator - applies versioned SQL migrations exactly once
#[derive(Parser, Debug)]
#[command(name = "dbmigrator")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Applies versioned SQL migrations to a database exactly once", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Target environment (defaults to `default_environment` from the config)
    #[arg(short, long, global = true, env = "DBMIGRATOR_ENV")]
    pub env: Option<String>,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the applied-migrations table
    Init(InitArgs),

    /// Apply every pending migration
    Migrate,

    /// Show declared, applied and pending migrations
    Status,
}

/// Arguments for the `init` command
#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Register numbered migrations up to and including N as applied
    #[arg(long, value_name = "N", conflicts_with = "skip_all")]
    pub skip_up_to: Option<u32>,

    /// Register every declared migration as applied
    #[arg(long)]
    pub skip_all: bool,
}

impl InitArgs {
    /// Which declared migrations `init` registers without running them.
    pub fn skip_policy(&self) -> SkipPolicy {
        match (self.skip_all, self.skip_up_to) {
            (true, _) => SkipPolicy::AllDeclared,
            (false, Some(n)) => SkipPolicy::UpTo(n),
            (false, None) => SkipPolicy::Nothing,
        }
    }
}
