use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use tracing::{info, warn};

use tidemark_core::config::TidemarkConfig;
use tidemark_runtime::migrations::{ApplyReport, MigrationPlan, MigrationRunner, RunMode};
use tidemark_runtime::{Database, MySqlDatabase};

/// Result of a run against the database.
#[derive(Debug)]
pub enum Outcome {
    Planned(MigrationPlan),
    Applied(ApplyReport),
}

/// Connect, apply (or plan) and always close the connection.
///
/// Missing connection settings are rejected by [`MySqlDatabase::connect`]
/// before any network traffic.
pub async fn run(location: &Path, config: TidemarkConfig, dry_run: bool) -> Result<()> {
    println!();
    println!(
        "  {}  {} Migrations",
        style("⚒️").bold(),
        style("tidemark").bold().cyan()
    );
    println!();

    info!(
        "Migrating {} (location: {})",
        config.database.redacted(),
        location.display()
    );

    let mut db = MySqlDatabase::connect(&config.database).await?;

    let runner =
        MigrationRunner::new().with_single_transaction(config.migrations.single_transaction);
    let result = drive(&runner, &mut db, location, dry_run).await;

    if let Err(e) = db.close().await {
        warn!("Failed to close database connection: {}", e);
    }

    let outcome = result.with_context(|| format!("Migration of {} failed", location.display()))?;
    print_outcome(&outcome);
    Ok(())
}

/// Run the migration step on an already-open connection.
pub async fn drive(
    runner: &MigrationRunner,
    db: &mut dyn Database,
    location: &Path,
    dry_run: bool,
) -> tidemark_core::Result<Outcome> {
    if dry_run {
        runner.plan(db, location).await.map(Outcome::Planned)
    } else {
        runner.apply(db, location).await.map(Outcome::Applied)
    }
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Planned(plan) => {
            if let Some(last) = plan.last_applied {
                println!("  {} Last applied: {}", style("ℹ").blue(), style(last).cyan());
            }
            if plan.pending.is_empty() {
                println!("  {} Nothing to apply", style("ℹ").blue());
            } else {
                println!("  {} Pending:", style("○").yellow());
                for file in &plan.pending {
                    println!("    {} {}", style("→").dim(), style(&file.name).yellow());
                }
            }
            if plan.mode == RunMode::SingleFile {
                println!(
                    "  {} Single-file mode: the ledger is not consulted or updated",
                    style("ℹ").blue()
                );
            }
        }
        Outcome::Applied(report) => {
            if report.applied.is_empty() {
                println!("  {} Database is up to date", style("✓").green());
            } else {
                for name in &report.applied {
                    println!("  {} Applied: {}", style("✓").green(), name);
                }
                println!();
                println!(
                    "  {} {} migration(s) applied",
                    style("✓").green(),
                    report.applied.len()
                );
            }
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tidemark_runtime::testing::MemoryDatabase;

    #[tokio::test]
    async fn test_drive_dry_run_leaves_database_untouched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20200101000000_A.sql"), "SELECT 1;").unwrap();
        let mut db = MemoryDatabase::new();

        let outcome = drive(&MigrationRunner::new(), &mut db, dir.path(), true)
            .await
            .unwrap();

        match outcome {
            Outcome::Planned(plan) => assert_eq!(plan.pending.len(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(db.executed().is_empty());
        assert!(db.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_drive_apply_records_migrations() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20200101000000_A.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("20200102000000_B.sql"), "SELECT 2;").unwrap();
        let mut db = MemoryDatabase::new();

        let outcome = drive(&MigrationRunner::new(), &mut db, dir.path(), false)
            .await
            .unwrap();

        match outcome {
            Outcome::Applied(report) => assert_eq!(report.applied.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(db.ledger(), ["20200101000000", "20200102000000"]);
    }

    #[tokio::test]
    async fn test_run_rejects_incomplete_settings_before_connecting() {
        let dir = TempDir::new().unwrap();
        let err = run(dir.path(), TidemarkConfig::default(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing database setting"));
    }
}
