//! Migration runner: picks pending migrations, runs them and records them.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tidemark_core::error::{Result, TidemarkError};
use tidemark_core::MigrationId;

use super::executor::MigrationExecutor;
use super::ledger::Ledger;
use super::source::{
    pending_after, MigrationFile, MigrationSource, RunMode, MIGRATION_EXTENSION,
};
use crate::db::Database;

/// What a run would do at a given location.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub mode: RunMode,
    /// Ledger high-water mark at the start of the run (batch mode only).
    pub last_applied: Option<MigrationId>,
    /// Files to execute, in order.
    pub pending: Vec<MigrationFile>,
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub mode: RunMode,
    pub previous: Option<MigrationId>,
    /// Names of the files that were executed, in order.
    pub applied: Vec<String>,
}

/// Orchestrates source, ledger and executor over one connection.
#[derive(Debug, Clone, Default)]
pub struct MigrationRunner {
    ledger: Ledger,
    executor: MigrationExecutor,
    single_transaction: bool,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap each migration and its ledger row in one transaction.
    pub fn with_single_transaction(mut self, enabled: bool) -> Self {
        self.single_transaction = enabled;
        self
    }

    /// Work out which migrations at `location` are pending.
    ///
    /// Creates the ledger table if it is missing, but executes nothing else.
    pub async fn plan(&self, db: &mut dyn Database, location: &Path) -> Result<MigrationPlan> {
        self.ledger.ensure_storage(db).await?;

        let candidates = MigrationSource::list_from(location)?;

        match candidates.mode {
            RunMode::SingleFile => {
                debug!("Single-file mode, ledger comparison skipped");
                Ok(MigrationPlan {
                    mode: RunMode::SingleFile,
                    last_applied: None,
                    pending: candidates.files,
                })
            }
            RunMode::Batch => {
                let last_applied = self.ledger.last_applied(db).await?;
                let pending = pending_after(candidates.files, last_applied);
                debug!("{} pending migration(s)", pending.len());
                Ok(MigrationPlan {
                    mode: RunMode::Batch,
                    last_applied,
                    pending,
                })
            }
        }
    }

    /// Apply every pending migration at `location`, stopping at the first
    /// failure.
    pub async fn apply(&self, db: &mut dyn Database, location: &Path) -> Result<ApplyReport> {
        let plan = self.plan(db, location).await?;

        if plan.pending.is_empty() {
            info!("No pending migrations in {}", location.display());
        }

        let record = plan.mode == RunMode::Batch;
        let mut applied = Vec::with_capacity(plan.pending.len());

        for file in &plan.pending {
            self.apply_one(db, file, record).await?;
            applied.push(file.name.clone());
        }

        Ok(ApplyReport {
            mode: plan.mode,
            previous: plan.last_applied,
            applied,
        })
    }

    async fn apply_one(
        &self,
        db: &mut dyn Database,
        file: &MigrationFile,
        record: bool,
    ) -> Result<()> {
        if !self.single_transaction {
            return self.execute_and_record(db, file, record).await;
        }

        db.execute("START TRANSACTION", &[]).await.map_err(|e| {
            TidemarkError::Storage(format!(
                "Failed to start transaction for {}: {}",
                file.name, e
            ))
        })?;

        match self.execute_and_record(db, file, record).await {
            Ok(()) => {
                db.execute("COMMIT", &[]).await.map_err(|e| {
                    TidemarkError::Storage(format!("Failed to commit {}: {}", file.name, e))
                })?;
                Ok(())
            }
            Err(err) => {
                if let Err(e) = db.execute("ROLLBACK", &[]).await {
                    warn!("Failed to roll back {}: {}", file.name, e);
                }
                Err(err)
            }
        }
    }

    async fn execute_and_record(
        &self,
        db: &mut dyn Database,
        file: &MigrationFile,
        record: bool,
    ) -> Result<()> {
        self.executor.run(db, file).await?;

        if record {
            let id = file.id.ok_or_else(|| {
                TidemarkError::InvalidArgument(format!(
                    "{} has no migration id and cannot be recorded",
                    file.name
                ))
            })?;
            self.ledger.record(db, id).await?;
            info!("Migration applied: {}", file.name);
        } else {
            info!("Migration executed without recording: {}", file.name);
        }

        Ok(())
    }

    /// Create an empty migration named after the current UTC time.
    pub fn create(location: &Path, name: &str) -> Result<PathBuf> {
        Self::create_at(location, name, Utc::now())
    }

    /// Create an empty migration `<YYYYMMDDHHMMSS>_<name>.sql` for `at`.
    pub fn create_at(location: &Path, name: &str, at: DateTime<Utc>) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TidemarkError::InvalidArgument(
                "migration name must not be empty".into(),
            ));
        }
        if name.contains(['/', '\\']) {
            return Err(TidemarkError::InvalidArgument(format!(
                "migration name '{}' must not contain path separators",
                name
            )));
        }

        let id = MigrationId::from_datetime(at);
        let path = location.join(format!("{}_{}.{}", id, name, MIGRATION_EXTENSION));

        info!("Creating migration file: {}", path.display());
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| TidemarkError::io(&path, e))?;

        Ok(path)
    }
}
