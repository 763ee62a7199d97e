//! dbmigrator - applies versioned SQL migrations exactly once.

use clap::Parser;

use dbmigrator_cli::cli::{Cli, Command};
use dbmigrator_cli::commands;
use dbmigrator_cli::error::CliResult;
use dbmigrator_cli::logging;
use dbmigrator_cli::output;

fn main() {
    if let Err(e) = run() {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    match &cli.command {
        Command::Init(args) => commands::init::run(&cli, args),
        Command::Migrate => commands::migrate::run(&cli),
        Command::Status => commands::status::run(&cli),
    }
}
