use std::path::PathBuf;

use thiserror::Error;

/// Core error type for tidemark operations.
#[derive(Error, Debug)]
pub enum TidemarkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration {0} is already recorded in the ledger")]
    DuplicateEntry(String),

    #[error("Migrations '{first}' and '{second}' share the id {id}")]
    ConflictingIds {
        id: String,
        first: String,
        second: String,
    },

    #[error("Migration '{migration}' failed at statement {statement}: {message}")]
    SqlExecution {
        migration: String,
        statement: usize,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl TidemarkError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TidemarkError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error may be skipped over instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TidemarkError::Parse(_))
    }
}

/// Result type alias using TidemarkError.
pub type Result<T> = std::result::Result<T, TidemarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_parse_errors_are_recoverable() {
        assert!(TidemarkError::Parse("bad".into()).is_recoverable());
        assert!(!TidemarkError::Storage("down".into()).is_recoverable());
        assert!(!TidemarkError::DuplicateEntry("20200101000000".into()).is_recoverable());
        assert!(!TidemarkError::ConflictingIds {
            id: "20200101000000".into(),
            first: "20200101000000_A.sql".into(),
            second: "20200101000000_B.sql".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_sql_execution_message_names_migration_and_statement() {
        let err = TidemarkError::SqlExecution {
            migration: "20200101000000_A.sql".into(),
            statement: 2,
            message: "You have an error in your SQL syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("20200101000000_A.sql"));
        assert!(msg.contains("statement 2"));
        assert!(msg.contains("SQL syntax"));
    }

    #[test]
    fn test_io_message_includes_path() {
        let err = TidemarkError::io(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("/tmp/missing"));
    }
}
