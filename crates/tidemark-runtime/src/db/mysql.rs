use std::time::Duration;

use futures_util::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Either, Executor};
use tracing::debug;

use tidemark_core::config::DatabaseConfig;
use tidemark_core::error::{Result, TidemarkError};

use super::{Database, DbError, DbFuture, StatementOutcome};

/// A single MySQL connection.
///
/// Owned by the caller for the whole run and closed with [`MySqlDatabase::close`].
pub struct MySqlDatabase {
    conn: MySqlConnection,
}

impl MySqlDatabase {
    /// Open a connection using the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(config.password.as_deref().unwrap_or_default())
            .database(&config.database);

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let conn = tokio::time::timeout(timeout, options.connect())
            .await
            .map_err(|_| {
                TidemarkError::Connection(format!(
                    "Timed out after {}s connecting to {}",
                    config.connect_timeout_secs,
                    config.redacted()
                ))
            })?
            .map_err(|e| {
                TidemarkError::Connection(format!(
                    "Failed to connect to {}: {}",
                    config.redacted(),
                    e
                ))
            })?;

        debug!("Connected to {}", config.redacted());
        Ok(Self { conn })
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| TidemarkError::Connection(format!("Failed to close connection: {}", e)))
    }
}

impl Database for MySqlDatabase {
    fn table_exists<'a>(&'a mut self, table: &'a str) -> DbFuture<'a, bool> {
        Box::pin(async move {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            )
            .bind(table)
            .fetch_one(&mut self.conn)
            .await
            .map_err(map_error)?;

            Ok(count > 0)
        })
    }

    fn execute<'a>(&'a mut self, statement: &'a str, args: &'a [&'a str]) -> DbFuture<'a, u64> {
        Box::pin(async move {
            // Statements without arguments go over the text protocol; MySQL
            // refuses to prepare some of them (START TRANSACTION, ...).
            if args.is_empty() {
                return (&mut self.conn)
                    .execute(sqlx::raw_sql(statement))
                    .await
                    .map(|r| r.rows_affected())
                    .map_err(map_error);
            }

            let mut query = sqlx::query(statement);
            for arg in args {
                query = query.bind(*arg);
            }
            query
                .execute(&mut self.conn)
                .await
                .map(|r| r.rows_affected())
                .map_err(map_error)
        })
    }

    fn fetch_optional_string<'a>(&'a mut self, query: &'a str) -> DbFuture<'a, Option<String>> {
        Box::pin(async move {
            let value: Option<Option<String>> = sqlx::query_scalar(query)
                .fetch_optional(&mut self.conn)
                .await
                .map_err(map_error)?;

            Ok(value.flatten())
        })
    }

    fn execute_script<'a>(
        &'a mut self,
        sql: &'a str,
        observer: &'a mut (dyn FnMut(StatementOutcome) + Send),
    ) -> DbFuture<'a, usize> {
        Box::pin(async move {
            let mut results = sqlx::raw_sql(sql).fetch_many(&mut self.conn);
            let mut completed = 0;
            let mut rows_returned = 0;

            while let Some(item) = results.next().await {
                match item.map_err(map_error)? {
                    Either::Left(done) => {
                        completed += 1;
                        observer(StatementOutcome {
                            index: completed,
                            rows_affected: done.rows_affected(),
                            rows_returned,
                        });
                        rows_returned = 0;
                    }
                    Either::Right(_row) => rows_returned += 1,
                }
            }

            Ok(completed)
        })
    }
}

fn map_error(e: sqlx::Error) -> DbError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => DbError::UniqueViolation(db.message().to_string()),
        Some(db) => DbError::Other(db.message().to_string()),
        None => DbError::Other(e.to_string()),
    }
}
