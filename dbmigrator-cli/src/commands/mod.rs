//! CLI command implementations.

pub mod init;
pub mod migrate;
pub mod status;

use dbmigrator_core::{MigrationEngine, MigrationStatus};

use crate::cli::Cli;
use crate::config::{Config, base_dir};
use crate::connect::{DynRepository, open_repository};
use crate::error::CliResult;
use crate::output;

/// An engine bound to the selected environment.
pub struct Session {
    /// Name of the selected environment
    pub environment: String,
    /// Engine over the environment's database
    pub engine: MigrationEngine<DynRepository>,
}

/// Load the config, announce the environment, read declared migrations and
/// connect to the environment's database.
pub fn open_session(cli: &Cli) -> CliResult<Session> {
    let config = Config::load(&cli.config)?;
    let environment = config.environment_name(cli.env.as_deref());
    output::info(&format!("Environment is set to '{}'", environment));

    let url = config.connection_url(&environment)?;
    let declared = config.source_locations(&base_dir(&cli.config)).load()?;
    let repository = open_repository(config.dialect, &url)?;
    let engine = MigrationEngine::new(config.engine_config(), repository, declared)?;

    Ok(Session {
        environment,
        engine,
    })
}

/// Print the one-line status and any applied records nobody declares.
pub fn print_status(status: &MigrationStatus) {
    for name in &status.unknown {
        output::warn(&format!("Applied migration {} is not declared", name));
    }
    output::status(&status.status_line());
}
