//! Splitting migration scripts into executable statements.
//!
//! A script is cleaned line by line and cut wherever a line consists of a
//! single `;`:
//!
//! ```text
//! create table orders (id int)
//! ;
//! create or replace trigger orders_bi
//!   before insert on orders
//! begin
//!   null;
//! end;
//! ;
//! ```
//!
//! Semicolons anywhere else stay inside their statement, which keeps
//! procedural bodies intact.

use tracing::trace;

use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};

/// A line consisting of exactly this text ends a statement.
pub const STATEMENT_SEPARATOR: &str = ";";

/// Declarations whose bodies must end with an explicit `;`.
const PROCEDURAL_DECLARATIONS: [&str; 3] = [
    "create or replace function",
    "create or replace trigger",
    "create or replace procedure",
];

/// Characters allowed after the final `;` of a procedural statement.
///
/// Room for a short marker such as ` --`, but not for ` end`: a body ending
/// in `begin null; end` has its last `;` four characters from the end and
/// must still be rejected as unterminated.
const MAX_TRAILING_CHARS: usize = 3;

/// Splits raw migration scripts for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementSplitter {
    dialect: Dialect,
}

impl StatementSplitter {
    /// Create a splitter for the dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// The dialect whose cleanup rules apply.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Split a script into statements, in source order.
    ///
    /// Comment-only lines, carriage returns and "execute now" lines are
    /// removed, the rest is cut on separator lines and empty fragments are
    /// dropped. Procedural declarations are checked for a closing `;` before
    /// anything is returned.
    pub fn split(&self, script: &str) -> MigrateResult<Vec<String>> {
        let mut statements = Vec::new();
        let mut current = String::new();

        for raw_line in script.split('\n') {
            let line = raw_line.replace('\r', "");

            if self.dialect.is_comment_line(&line) || self.dialect.is_execute_now_line(&line) {
                continue;
            }

            if line == STATEMENT_SEPARATOR {
                push_statement(&mut current, &mut statements)?;
                continue;
            }

            current.push_str(&line);
            current.push('\n');
        }
        push_statement(&mut current, &mut statements)?;

        trace!(count = statements.len(), dialect = %self.dialect, "Split script");
        Ok(statements)
    }
}

/// Split `script` with the rules of `dialect`.
pub fn split_statements(script: &str, dialect: Dialect) -> MigrateResult<Vec<String>> {
    StatementSplitter::new(dialect).split(script)
}

fn push_statement(current: &mut String, statements: &mut Vec<String>) -> MigrateResult<()> {
    let statement = current.trim();

    if !statement.is_empty() {
        validate_statement(statement)?;
        statements.push(statement.to_string());
    }

    current.clear();
    Ok(())
}

/// Reject procedural bodies that do not end with `;`.
pub fn validate_statement(statement: &str) -> MigrateResult<()> {
    let lowered = statement.to_lowercase();
    if !PROCEDURAL_DECLARATIONS
        .iter()
        .any(|decl| lowered.contains(decl))
    {
        return Ok(());
    }

    let trimmed = statement.trim_end();
    let terminated = trimmed
        .rfind(';')
        .is_some_and(|pos| trimmed[pos + 1..].chars().count() <= MAX_TRAILING_CHARS);

    if terminated {
        Ok(())
    } else {
        Err(MigrationError::UnterminatedProcedureBody {
            statement: trimmed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(script: &str) -> Vec<String> {
        split_statements(script, Dialect::Oracle).unwrap()
    }

    #[test]
    fn test_split_on_separator_line() {
        assert_eq!(
            split("select 1;\n;\nselect 2;"),
            vec!["select 1;", "select 2;"]
        );
    }

    #[test]
    fn test_semicolons_inside_lines_do_not_split() {
        let script = "insert into t values (1); insert into t values (2);\n;\n";
        assert_eq!(
            split(script),
            vec!["insert into t values (1); insert into t values (2);"]
        );
    }

    #[test]
    fn test_separator_must_be_alone_on_line() {
        assert_eq!(split("select 1\n ;\nselect 2"), vec!["select 1\n ;\nselect 2"]);
        assert_eq!(split("select 1\n;;\nselect 2"), vec!["select 1\n;;\nselect 2"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(
            split("create table a (id int)\r\n;\r\ncreate table b (id int)\r\n"),
            vec!["create table a (id int)", "create table b (id int)"]
        );
    }

    #[test]
    fn test_strips_comment_lines_only() {
        let script = "-- header comment\nselect 1 -- trailing stays\nfrom dual\n;\n  -- indented\n";
        assert_eq!(split(script), vec!["select 1 -- trailing stays\nfrom dual"]);
    }

    #[test]
    fn test_removes_execute_now_lines() {
        let script = "create or replace procedure p is\nbegin\n  null;\nend;\n/\n;\nselect 1 from dual\n/\n";
        assert_eq!(
            split(script),
            vec![
                "create or replace procedure p is\nbegin\n  null;\nend;",
                "select 1 from dual",
            ]
        );
    }

    #[test]
    fn test_mssql_go_lines() {
        let statements =
            split_statements("create table a (id int)\nGO\n;\nselect 1\ngo\n", Dialect::Mssql).unwrap();
        assert_eq!(statements, vec!["create table a (id int)", "select 1"]);
    }

    #[test]
    fn test_sqlite_keeps_slash_lines() {
        let statements = split_statements("select 4\n/\n2", Dialect::Sqlite).unwrap();
        assert_eq!(statements, vec!["select 4\n/\n2"]);
    }

    #[test]
    fn test_empty_fragments_are_dropped() {
        assert_eq!(split(";\n;\n\n   \n;\nselect 1\n;\n;\n"), vec!["select 1"]);
        assert!(split("").is_empty());
        assert!(split("-- only a comment\n").is_empty());
    }

    #[test]
    fn test_order_is_preserved_and_duplicates_kept() {
        assert_eq!(
            split("select 2\n;\nselect 1\n;\nselect 2"),
            vec!["select 2", "select 1", "select 2"]
        );
    }

    #[test]
    fn test_unterminated_procedure_is_rejected() {
        let err = split_statements(
            "create or replace procedure p is begin null; end",
            Dialect::Oracle,
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::UnterminatedProcedureBody { .. }));
    }

    #[test]
    fn test_procedure_terminator_window() {
        assert!(validate_statement("CREATE OR REPLACE FUNCTION f RETURN number IS BEGIN RETURN 1; END;").is_ok());
        assert!(validate_statement("create or replace trigger t begin null; end; --").is_ok());
        assert!(validate_statement("create or replace trigger t begin null; end; -- x").is_err());
        assert!(validate_statement("create or replace procedure p is begin null; end").is_err());
        assert!(validate_statement("create or replace procedure p is begin null end").is_err());
    }

    #[test]
    fn test_trailing_end_keyword_is_outside_window() {
        assert!(" end".chars().count() > MAX_TRAILING_CHARS);
        assert!(" --".chars().count() <= MAX_TRAILING_CHARS);

        let body = "create or replace function f return int is begin return 1; end";
        assert!(validate_statement(body).is_err());
        assert!(validate_statement(&format!("{body};")).is_ok());
    }

    #[test]
    fn test_non_procedural_statements_need_no_terminator() {
        assert!(validate_statement("create table t (id int)").is_ok());
        assert!(validate_statement("create procedure p as select 1").is_ok());
    }
}
