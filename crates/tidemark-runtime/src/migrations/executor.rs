use tracing::{debug, info};

use tidemark_core::error::{Result, TidemarkError};

use super::source::MigrationFile;
use crate::db::{Database, StatementOutcome};

/// Runs the SQL of one migration file against the database.
#[derive(Debug, Clone, Default)]
pub struct MigrationExecutor;

impl MigrationExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute every statement of `file` as one batch.
    ///
    /// Returns the number of statements that completed. The first failing
    /// statement aborts the rest of the file; statements already executed
    /// stay executed.
    pub async fn run(&self, db: &mut dyn Database, file: &MigrationFile) -> Result<usize> {
        let sql = file.load_sql()?;

        if !has_statements(&sql) {
            info!("Migration {} is empty, nothing to execute", file.name);
            return Ok(0);
        }

        info!("Running migration: {}", file.name);

        let name = file.name.as_str();
        let mut completed = 0;
        let mut observer = |outcome: StatementOutcome| {
            completed = outcome.index;
            debug!(
                "{}: statement {} done ({} row(s) affected, {} row(s) returned)",
                name, outcome.index, outcome.rows_affected, outcome.rows_returned
            );
        };

        let result = db.execute_script(&sql, &mut observer).await;

        match result {
            Ok(count) => {
                info!("Migration {} executed ({} statement(s))", file.name, count);
                Ok(count)
            }
            Err(e) => Err(TidemarkError::SqlExecution {
                migration: file.name.clone(),
                statement: completed + 1,
                message: e.to_string(),
            }),
        }
    }
}

/// Whether `sql` holds anything besides whitespace and `--` / `#` line
/// comments. MySQL answers "Query was empty" to a batch without statements.
fn has_statements(sql: &str) -> bool {
    sql.lines().map(str::trim).any(|line| {
        !line.is_empty() && !line.starts_with("--") && !line.starts_with('#')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDatabase;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, sql: &str) -> MigrationFile {
        let path = dir.join(name);
        std::fs::write(&path, sql).unwrap();
        MigrationFile {
            id: tidemark_core::MigrationId::from_file_name(name).ok(),
            name: name.to_string(),
            path,
        }
    }

    #[tokio::test]
    async fn test_runs_every_statement_in_order() {
        let dir = TempDir::new().unwrap();
        let file = write_file(
            dir.path(),
            "20200101000000_A.sql",
            "CREATE TABLE a (id INT);\nINSERT INTO a VALUES (1);\nSELECT 1;",
        );
        let mut db = MemoryDatabase::new();

        let count = MigrationExecutor::new().run(&mut db, &file).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(
            db.executed(),
            ["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)", "SELECT 1"]
        );
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_statements() {
        let dir = TempDir::new().unwrap();
        let file = write_file(
            dir.path(),
            "20200101000000_A.sql",
            "CREATE TABLE a (id INT); CREAT TABEL broken; CREATE TABLE c (id INT);",
        );
        let mut db = MemoryDatabase::new().fail_on("CREAT TABEL");

        let err = MigrationExecutor::new()
            .run(&mut db, &file)
            .await
            .unwrap_err();

        match err {
            TidemarkError::SqlExecution {
                migration,
                statement,
                message,
            } => {
                assert_eq!(migration, "20200101000000_A.sql");
                assert_eq!(statement, 2);
                assert!(message.contains("SQL syntax"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The first statement ran and is not undone; the third never ran.
        assert_eq!(db.executed(), ["CREATE TABLE a (id INT)"]);
    }

    #[tokio::test]
    async fn test_empty_script_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let file = write_file(dir.path(), "20210601000000_Init.sql", "  \n\t\n");
        let mut db = MemoryDatabase::new().fail_on("");

        let count = MigrationExecutor::new().run(&mut db, &file).await.unwrap();
        assert_eq!(count, 0);
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_comment_only_script_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let file = write_file(
            dir.path(),
            "20210601000000_Init.sql",
            "-- TODO: add the users table\n\n# nothing yet\n   -- indented\n",
        );
        let mut db = MemoryDatabase::new();

        let count = MigrationExecutor::new().run(&mut db, &file).await.unwrap();
        assert_eq!(count, 0);
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_commented_script_still_runs_its_statements() {
        let dir = TempDir::new().unwrap();
        let file = write_file(
            dir.path(),
            "20210601000000_Init.sql",
            "-- users\nCREATE TABLE users (id INT);\n",
        );
        let mut db = MemoryDatabase::new();

        let count = MigrationExecutor::new().run(&mut db, &file).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.executed(), ["CREATE TABLE users (id INT)"]);
    }

    #[test]
    fn test_has_statements() {
        assert!(!has_statements(""));
        assert!(!has_statements("  \n\t\n"));
        assert!(!has_statements("-- placeholder"));
        assert!(!has_statements("# one\n-- two\n"));
        assert!(has_statements("SELECT 1;"));
        assert!(has_statements("-- seed\nINSERT INTO t VALUES (1);"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_io_error() {
        let file = MigrationFile {
            id: None,
            name: "gone.sql".into(),
            path: "/nonexistent/gone.sql".into(),
        };
        let mut db = MemoryDatabase::new();

        let err = MigrationExecutor::new()
            .run(&mut db, &file)
            .await
            .unwrap_err();
        assert!(matches!(err, TidemarkError::Io { .. }));
    }
}
