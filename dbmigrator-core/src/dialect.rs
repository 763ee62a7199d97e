//! SQL dialects understood by the statement splitter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A target database dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Oracle Database (PL/SQL, `/` runs the buffered block).
    Oracle,
    /// Microsoft SQL Server (T-SQL, `GO` ends a batch).
    #[default]
    #[serde(alias = "sqlserver")]
    Mssql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 3] = [Dialect::Oracle, Dialect::Mssql, Dialect::Sqlite];

    /// Marker that starts a single-line comment.
    pub fn comment_marker(&self) -> &'static str {
        "--"
    }

    /// The "execute now" token that may stand alone on a line, if any.
    pub fn execute_now_token(&self) -> Option<&'static str> {
        match self {
            Self::Oracle => Some("/"),
            Self::Mssql => Some("GO"),
            Self::Sqlite => None,
        }
    }

    /// Whether the line is a comment-only line.
    pub fn is_comment_line(&self, line: &str) -> bool {
        line.trim_start().starts_with(self.comment_marker())
    }

    /// Whether the line consists solely of the "execute now" token.
    pub fn is_execute_now_line(&self, line: &str) -> bool {
        self.execute_now_token()
            .is_some_and(|token| line.trim().eq_ignore_ascii_case(token))
    }

    /// Lowercase name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Mssql => "mssql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(Self::Oracle),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!(
                "Db type must be 'oracle', 'mssql' or 'sqlite' but '{}' provided",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("Oracle".parse::<Dialect>().unwrap(), Dialect::Oracle);
        assert_eq!("MSSQL".parse::<Dialect>().unwrap(), Dialect::Mssql);
        assert_eq!("sqlserver".parse::<Dialect>().unwrap(), Dialect::Mssql);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);

        let err = "postgres".parse::<Dialect>().unwrap_err();
        assert!(err.contains("'postgres'"));
    }

    #[test]
    fn test_execute_now_lines() {
        assert!(Dialect::Oracle.is_execute_now_line("/"));
        assert!(Dialect::Oracle.is_execute_now_line(" / "));
        assert!(!Dialect::Oracle.is_execute_now_line("/ x"));
        assert!(Dialect::Mssql.is_execute_now_line("go"));
        assert!(Dialect::Mssql.is_execute_now_line("GO"));
        assert!(!Dialect::Mssql.is_execute_now_line("/"));
        assert!(!Dialect::Sqlite.is_execute_now_line("/"));
    }

    #[test]
    fn test_comment_lines() {
        let d = Dialect::Oracle;
        assert!(d.is_comment_line("-- header"));
        assert!(d.is_comment_line("   --indented"));
        assert!(!d.is_comment_line("select 1 -- trailing"));
    }

    #[test]
    fn test_display_round_trip() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }
}
