//! In-memory database for tests.

use std::collections::HashSet;

use crate::db::{Database, DbError, DbFuture, StatementOutcome};

/// A scripted stand-in for a MySQL connection.
///
/// Understands the handful of statements the ledger issues (`CREATE TABLE`,
/// `INSERT INTO`, `SELECT MAX(..)`) plus transaction control, and executes
/// migration scripts by splitting them on `;` and dropping `--` / `#` line
/// comments; a script with no statements left fails with "Query was empty",
/// as MySQL does. A script statement containing one of the configured failure
/// markers fails with a syntax error.
/// `ROLLBACK` restores the ledger rows written since `START TRANSACTION`.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: HashSet<String>,
    ledger: Vec<String>,
    executed: Vec<String>,
    fail_markers: Vec<String>,
    fail_storage: bool,
    snapshot: Option<Vec<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing ledger table holding these ids.
    pub fn with_ledger(ids: &[&str]) -> Self {
        let mut db = Self::new();
        db.tables.insert("migrations".to_string());
        db.ledger = ids.iter().map(|s| s.to_string()).collect();
        db
    }

    /// Make script statements containing `marker` fail.
    pub fn fail_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Make ledger table creation and ledger writes fail.
    pub fn fail_storage(mut self) -> Self {
        self.fail_storage = true;
        self
    }

    /// Ids currently stored in the ledger, in insertion order.
    pub fn ledger(&self) -> &[String] {
        &self.ledger
    }

    /// Every statement executed so far, script statements and transaction
    /// control included, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    fn run_statement(&mut self, statement: &str, args: &[&str]) -> Result<u64, DbError> {
        let upper = statement.trim().to_ascii_uppercase();

        if upper.starts_with("CREATE TABLE") {
            if self.fail_storage {
                return Err(DbError::Other("CREATE command denied to user".into()));
            }
            let name = statement
                .split_whitespace()
                .nth(2)
                .map(|s| s.trim_matches(|c: char| c == '`' || c == '('))
                .unwrap_or_default()
                .to_string();
            self.tables.insert(name);
            return Ok(0);
        }

        if upper.starts_with("INSERT INTO") {
            if !self.tables.contains("migrations") {
                return Err(DbError::Other("Table 'migrations' doesn't exist".into()));
            }
            if self.fail_storage {
                return Err(DbError::Other("INSERT command denied to user".into()));
            }
            let id = args.first().copied().unwrap_or_default().to_string();
            if self.ledger.contains(&id) {
                return Err(DbError::UniqueViolation(format!(
                    "Duplicate entry '{}' for key 'PRIMARY'",
                    id
                )));
            }
            self.ledger.push(id);
            return Ok(1);
        }

        match upper.as_str() {
            "START TRANSACTION" => {
                self.snapshot = Some(self.ledger.clone());
            }
            "COMMIT" => {
                self.snapshot = None;
            }
            "ROLLBACK" => {
                if let Some(ledger) = self.snapshot.take() {
                    self.ledger = ledger;
                }
            }
            _ => {}
        }

        self.executed.push(statement.trim().to_string());
        Ok(0)
    }
}

impl Database for MemoryDatabase {
    fn table_exists<'a>(&'a mut self, table: &'a str) -> DbFuture<'a, bool> {
        Box::pin(async move { Ok(self.tables.contains(table)) })
    }

    fn execute<'a>(&'a mut self, statement: &'a str, args: &'a [&'a str]) -> DbFuture<'a, u64> {
        Box::pin(async move { self.run_statement(statement, args) })
    }

    fn fetch_optional_string<'a>(&'a mut self, query: &'a str) -> DbFuture<'a, Option<String>> {
        Box::pin(async move {
            if !query.to_ascii_uppercase().contains("MAX(") {
                return Err(DbError::Other(format!("unsupported query: {}", query)));
            }
            if !self.tables.contains("migrations") {
                return Err(DbError::Other("Table 'migrations' doesn't exist".into()));
            }
            Ok(self.ledger.iter().max().cloned())
        })
    }

    fn execute_script<'a>(
        &'a mut self,
        sql: &'a str,
        observer: &'a mut (dyn FnMut(StatementOutcome) + Send),
    ) -> DbFuture<'a, usize> {
        Box::pin(async move {
            let statements: Vec<String> = sql
                .split(';')
                .map(strip_line_comments)
                .filter(|s| !s.is_empty())
                .collect();
            if statements.is_empty() {
                return Err(DbError::Other("Query was empty".into()));
            }

            let mut completed = 0;
            for statement in &statements {
                if self.fail_markers.iter().any(|m| statement.contains(m.as_str())) {
                    return Err(DbError::Other(format!(
                        "You have an error in your SQL syntax near '{}'",
                        statement
                    )));
                }
                self.executed.push(statement.clone());
                completed += 1;
                observer(StatementOutcome {
                    index: completed,
                    rows_affected: 0,
                    rows_returned: 0,
                });
            }
            Ok(completed)
        })
    }
}

fn strip_line_comments(statement: &str) -> String {
    statement
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--") && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}
