//! Database seam used by the ledger and the executor.
//!
//! Everything above this module talks to a `&mut dyn Database`; the MySQL
//! implementation lives in [`mysql`], and an in-memory one for tests lives in
//! `crate::testing`.

mod mysql;

pub use mysql::MySqlDatabase;

use std::future::Future;
use std::pin::Pin;

/// Future returned by [`Database`] operations.
pub type DbFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'a>>;

/// Errors reported by a [`Database`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// A unique or primary key constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other error, carrying the server's message.
    #[error("{0}")]
    Other(String),
}

/// Outcome of one statement inside a multi-statement script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementOutcome {
    /// 1-based position of the statement in the script.
    pub index: usize,
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Rows the statement returned (and that were drained).
    pub rows_returned: u64,
}

/// A single open database connection.
pub trait Database: Send {
    /// Whether a table with this name exists in the current schema.
    fn table_exists<'a>(&'a mut self, table: &'a str) -> DbFuture<'a, bool>;

    /// Execute one statement with positional string arguments, returning the
    /// number of affected rows.
    fn execute<'a>(&'a mut self, statement: &'a str, args: &'a [&'a str]) -> DbFuture<'a, u64>;

    /// Run a query returning at most one nullable string column.
    fn fetch_optional_string<'a>(&'a mut self, query: &'a str) -> DbFuture<'a, Option<String>>;

    /// Submit `sql` as one multi-statement batch.
    ///
    /// Every result the server produces is consumed in order, and `observer`
    /// is called once per completed statement. The first failing statement
    /// stops the batch. Returns the number of completed statements.
    fn execute_script<'a>(
        &'a mut self,
        sql: &'a str,
        observer: &'a mut (dyn FnMut(StatementOutcome) + Send),
    ) -> DbFuture<'a, usize>;
}
