mod database;

pub use database::DatabaseConfig;

use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, TidemarkError};

/// Root configuration for tidemark.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TidemarkConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration execution settings.
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

impl TidemarkConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TidemarkError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| TidemarkError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// How each migration is executed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationsConfig {
    /// Wrap each migration and its ledger row in one transaction.
    ///
    /// MySQL commits implicitly around DDL, so this only guards DML.
    #[serde(default)]
    pub single_transaction: bool,
}

/// Replace `${VAR}` references with the value of the environment variable.
/// Unset variables are left untouched.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
