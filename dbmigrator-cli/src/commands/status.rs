//! `dbmigrator status` - compare declared and applied migrations.

use dbmigrator_core::AppliedSetRepository;

use crate::cli::Cli;
use crate::commands::{open_session, print_status};
use crate::error::CliResult;
use crate::output;

/// Run the status command
pub fn run(cli: &Cli) -> CliResult<()> {
    let session = open_session(cli)?;
    let status = session.engine.status();

    output::header(&format!("Migration Status ({})", session.environment));
    output::kv("Database", &session.engine.repository().target());

    if !status.initialized {
        output::warn("Migration table does not exist. Run \"init\" first");
    } else if status.pending.is_empty() {
        output::success("Database is up to date");
    } else {
        output::list(&format!("{} pending migrations:", status.pending.len()));
        for name in &status.pending {
            output::list_item(&output::style_pending(name));
        }
    }

    output::newline();
    print_status(&status);
    Ok(())
}
