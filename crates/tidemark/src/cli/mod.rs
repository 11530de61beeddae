mod apply;
mod create;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use tidemark_core::config::TidemarkConfig;

/// Apply timestamped SQL migrations to a MySQL database exactly once.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// MySQL host.
    #[arg(short = 'm', long, env = "TIDEMARK_HOST")]
    pub host: Option<String>,

    /// MySQL port.
    #[arg(short = 'P', long, env = "TIDEMARK_PORT")]
    pub port: Option<u16>,

    /// Database name.
    #[arg(short, long, env = "TIDEMARK_DATABASE")]
    pub database: Option<String>,

    /// Username.
    #[arg(short, long, env = "TIDEMARK_USERNAME")]
    pub username: Option<String>,

    /// Password.
    #[arg(short, long, env = "TIDEMARK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create an empty migration file with the given name.
    #[arg(
        short,
        long,
        value_name = "NAME",
        conflicts_with_all = ["dry_run", "single_transaction"]
    )]
    pub create: Option<String>,

    /// Configuration file path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// List pending migrations without applying them.
    #[arg(long)]
    pub dry_run: bool,

    /// Run each migration and its ledger row in one transaction.
    #[arg(long)]
    pub single_transaction: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Migrations directory, or a single migration file.
    pub location: PathBuf,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        init_tracing(self.verbose);

        if let Some(name) = &self.create {
            return create::run(&self.location, name);
        }

        let config = self.resolve_config()?;
        apply::run(&self.location, config, self.dry_run).await
    }

    /// Merge the optional config file with command-line settings; flags win.
    fn resolve_config(&self) -> Result<TidemarkConfig> {
        let mut config = match &self.config {
            Some(path) => TidemarkConfig::from_file(path)?,
            None => TidemarkConfig::default(),
        };

        let db = &mut config.database;
        if let Some(host) = &self.host {
            db.host = host.clone();
        }
        if let Some(port) = self.port {
            db.port = port;
        }
        if let Some(database) = &self.database {
            db.database = database.clone();
        }
        if let Some(username) = &self.username {
            db.username = username.clone();
        }
        if let Some(password) = &self.password {
            db.password = Some(password.clone());
        }
        if self.single_transaction {
            config.migrations.single_transaction = true;
        }

        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .with_target(false)
        .init();
}
