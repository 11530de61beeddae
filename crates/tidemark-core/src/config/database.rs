use serde::Deserialize;

use crate::error::{Result, TidemarkError};

/// Connection settings for the target MySQL database.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Server host name or address.
    #[serde(default)]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database (schema) the migrations are applied to.
    #[serde(default)]
    pub database: String,

    /// Login user.
    #[serde(default)]
    pub username: String,

    /// Login password. An empty string is a valid password; `None` is not.
    #[serde(default)]
    pub password: Option<String>,

    /// How long to wait for the connection to be established, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            database: String::new(),
            username: String::new(),
            password: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Check that every setting needed to connect is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.database.trim().is_empty() {
            missing.push("database");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.is_none() {
            missing.push("password");
        }

        if !missing.is_empty() {
            return Err(TidemarkError::Config(format!(
                "missing database setting(s): {}",
                missing.join(", ")
            )));
        }

        if self.connect_timeout_secs == 0 {
            return Err(TidemarkError::Config(
                "connect_timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Human-readable connection target, never including the password.
    pub fn redacted(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

fn default_port() -> u16 {
    3306
}

fn default_connect_timeout() -> u64 {
    30
}
