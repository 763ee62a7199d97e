//! `dbmigrator init` - create applied-set storage.

use dbmigrator_core::AppliedSetRepository;

use crate::cli::{Cli, InitArgs};
use crate::commands::{open_session, print_status};
use crate::error::CliResult;
use crate::output;

/// Run the init command
pub fn run(cli: &Cli, args: &InitArgs) -> CliResult<()> {
    let mut session = open_session(cli)?;

    let registered = session.engine.init(args.skip_policy())?;
    output::success(&format!(
        "DB '{}' initialized for migrations. {} scripts have been registered",
        session.engine.repository().target(),
        registered
    ));

    print_status(&session.engine.status());
    Ok(())
}
