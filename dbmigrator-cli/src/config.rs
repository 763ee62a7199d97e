//! CLI configuration handling.

use dbmigrator_core::{Dialect, EngineConfig, SourceLocations, TransactionMode};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "dbmigrator.toml";

/// Environment used when neither `--env` nor `default_environment` is set
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// dbmigrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dialect of every environment's database
    pub dialect: Dialect,

    /// Environment used when none is given on the command line
    pub default_environment: Option<String>,

    /// Where declared migrations are read from
    pub sources: SourcesConfig,

    /// Migration run settings
    pub migrate: MigrateConfig,

    /// Connection settings per environment name
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// Migration source locations, relative to the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Numbered migrations folder
    pub changesets: PathBuf,

    /// Object migrations folder, searched recursively
    pub objects: PathBuf,

    /// Archive of numbered migrations, preferred when present
    pub archive: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        let defaults = SourceLocations::default();
        Self {
            changesets: defaults.changesets,
            objects: defaults.objects,
            archive: defaults.archive,
        }
    }
}

/// Migration run settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Transaction boundary around each migration
    pub transaction: TransactionMode,
}

/// Connection settings of one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Connection URL or connection string; `${VAR}` references are expanded
    pub url: String,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.is_file() {
            return Err(CliError::config(format!(
                "DB config {} is not found",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// The environment to use: the requested one, else `default_environment`,
    /// else `dev`.
    pub fn environment_name(&self, requested: Option<&str>) -> String {
        requested
            .or(self.default_environment.as_deref())
            .unwrap_or(DEFAULT_ENVIRONMENT)
            .to_string()
    }

    /// Connection URL of `env` with `${VAR}` references expanded.
    pub fn connection_url(&self, env: &str) -> CliResult<String> {
        let environment = self.environments.get(env).ok_or_else(|| {
            let known: Vec<_> = self.environments.keys().map(String::as_str).collect();
            CliError::config(format!(
                "Environment '{}' is not configured (known: {})",
                env,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })?;

        expand_env_vars(&environment.url)
    }

    /// Source locations resolved against `base_dir`.
    pub fn source_locations(&self, base_dir: &Path) -> SourceLocations {
        SourceLocations::default()
            .changesets(base_dir.join(&self.sources.changesets))
            .objects(base_dir.join(&self.sources.objects))
            .archive(self.sources.archive.as_ref().map(|p| base_dir.join(p)))
    }

    /// Engine settings for a run.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new().transaction(self.migrate.transaction)
    }
}

/// Directory that relative paths in the config file are resolved against.
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Expand `${VAR}` references from the process environment.
pub fn expand_env_vars(value: &str) -> CliResult<String> {
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| CliError::config(format!("Invalid expansion pattern: {}", e)))?;

    let mut result = String::with_capacity(value.len());
    let mut last = 0;
    for caps in re.captures_iter(value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let var = std::env::var(name.as_str()).map_err(|_| {
            CliError::config(format!(
                "Environment variable '{}' is not set",
                name.as_str()
            ))
        })?;
        result.push_str(&value[last..whole.start()]);
        result.push_str(&var);
        last = whole.end();
    }
    result.push_str(&value[last..]);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
dialect = "sqlite"
default_environment = "local"

[sources]
changesets = "db/changesets"
archive = "db/scripts.zip"

[migrate]
transaction = "per-migration"

[environments.local]
url = "local.db"

[environments.prod]
url = "${DBMIGRATOR_TEST_PROD_PATH}/prod.db"
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.default_environment.as_deref(), Some("local"));
        assert_eq!(config.sources.changesets, PathBuf::from("db/changesets"));
        assert_eq!(config.sources.objects, PathBuf::from("objects"));
        assert_eq!(config.migrate.transaction, TransactionMode::PerMigration);
        assert_eq!(config.environments.len(), 2);
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.dialect, Dialect::Mssql);
        assert_eq!(config.migrate.transaction, TransactionMode::None);
        assert_eq!(config.environment_name(None), "dev");
        assert_eq!(config.sources.archive, Some(PathBuf::from("db_scripts.zip")));
    }

    #[test]
    fn test_environment_name_resolution() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.environment_name(None), "local");
        assert_eq!(config.environment_name(Some("prod")), "prod");
    }

    #[test]
    fn test_unknown_environment() {
        let config = Config::parse(SAMPLE).unwrap();
        let err = config.connection_url("qa").unwrap_err();
        assert!(err.to_string().contains("'qa' is not configured"));
        assert!(err.to_string().contains("local, prod"));
    }

    #[test]
    fn test_env_expansion() {
        // SAFETY: test-only variable with a unique name
        unsafe {
            std::env::set_var("DBMIGRATOR_TEST_PROD_PATH", "/srv/data");
        }
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.connection_url("prod").unwrap(), "/srv/data/prod.db");
        assert_eq!(config.connection_url("local").unwrap(), "local.db");
    }

    #[test]
    fn test_missing_env_var() {
        let err = expand_env_vars("${DBMIGRATOR_TEST_SURELY_UNSET}").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("DBMIGRATOR_TEST_SURELY_UNSET"));
    }

    #[test]
    fn test_source_locations_are_relative_to_config() {
        let config = Config::parse(SAMPLE).unwrap();
        let locations = config.source_locations(Path::new("/app"));
        assert_eq!(locations.changesets, PathBuf::from("/app/db/changesets"));
        assert_eq!(locations.objects, PathBuf::from("/app/objects"));
        assert_eq!(locations.archive, Some(PathBuf::from("/app/db/scripts.zip")));
    }

    #[test]
    fn test_base_dir() {
        assert_eq!(base_dir(Path::new("dbmigrator.toml")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("/etc/app/dbmigrator.toml")), PathBuf::from("/etc/app"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::parse("dialect = ").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));
    }

    #[test]
    fn test_unknown_dialect() {
        assert!(Config::parse("dialect = \"postgres\"").is_err());
    }
}
