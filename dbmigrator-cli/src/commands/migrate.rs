//! `dbmigrator migrate` - apply pending migrations.

use dbmigrator_core::MigrationError;

use crate::cli::Cli;
use crate::commands::{open_session, print_status};
use crate::error::CliResult;
use crate::output;

const FRAGMENT_CHARS: usize = 200;

/// Run the migrate command
pub fn run(cli: &Cli) -> CliResult<()> {
    let mut session = open_session(cli)?;

    let pending = session.engine.pending().len();
    if pending > 0 {
        output::list(&format!("{} pending migrations found:", pending));
    }

    match session.engine.migrate() {
        Ok(summary) => {
            for name in &summary.applied {
                output::success(&format!("Applied {}", name));
            }
            output::dim(&summary.summary());
            print_status(&session.engine.status());
            Ok(())
        }
        Err(err) => {
            for name in err.applied_before_failure() {
                output::success(&format!("Applied {}", name));
            }
            report_failure(&err);
            print_status(&session.engine.status());
            Err(err.into())
        }
    }
}

fn report_failure(err: &MigrationError) {
    if let MigrationError::StatementExecutionFailed {
        migration,
        statement,
        message,
        ..
    } = err.root_cause()
    {
        output::newline();
        output::list(&output::style_error(&format!("Failed to apply {}", migration)));
        output::kv("Statement", &fragment(statement));
        output::kv("Message", message);
    }
}

/// First line of a statement, shortened for display.
fn fragment(statement: &str) -> String {
    let first_line = statement.lines().next().unwrap_or_default().trim();
    let mut fragment: String = first_line.chars().take(FRAGMENT_CHARS).collect();
    if fragment.len() < first_line.len() || statement.trim().lines().nth(1).is_some() {
        fragment.push_str(" ...");
    }
    fragment
}
