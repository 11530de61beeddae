//! The `migrations` table: a high-water mark of applied migration ids.

use tracing::{debug, info};

use tidemark_core::error::{Result, TidemarkError};
use tidemark_core::MigrationId;

use crate::db::{Database, DbError};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

/// Reads and appends applied migration ids.
///
/// The table is created on first use and never dropped; rows are only ever
/// inserted.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LEDGER_TABLE)
    }
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure_storage(&self, db: &mut dyn Database) -> Result<()> {
        let exists = db.table_exists(&self.table).await.map_err(|e| {
            TidemarkError::Storage(format!(
                "Failed to look up ledger table '{}': {}",
                self.table, e
            ))
        })?;

        if exists {
            debug!("Ledger table '{}' exists", self.table);
            return Ok(());
        }

        info!("Creating ledger table '{}'", self.table);
        let ddl = format!(
            "CREATE TABLE {} (id VARCHAR(14) NOT NULL, PRIMARY KEY (id))",
            self.table
        );
        db.execute(&ddl, &[]).await.map_err(|e| {
            TidemarkError::Storage(format!(
                "Failed to create ledger table '{}': {}",
                self.table, e
            ))
        })?;

        Ok(())
    }

    /// The highest recorded id, or `None` for an empty ledger.
    pub async fn last_applied(&self, db: &mut dyn Database) -> Result<Option<MigrationId>> {
        let query = format!("SELECT MAX(id) FROM {}", self.table);
        let value = db.fetch_optional_string(&query).await.map_err(|e| {
            TidemarkError::Storage(format!("Failed to read ledger '{}': {}", self.table, e))
        })?;

        let Some(value) = value else {
            info!("Ledger is empty");
            return Ok(None);
        };

        let id = MigrationId::parse(value.trim()).map_err(|_| {
            TidemarkError::Storage(format!(
                "Invalid migration id in ledger '{}': '{}'",
                self.table, value
            ))
        })?;

        info!("Last applied migration: {}", id);
        Ok(Some(id))
    }

    /// Append `id` to the ledger.
    pub async fn record(&self, db: &mut dyn Database, id: MigrationId) -> Result<()> {
        let canonical = id.as_canonical();
        let statement = format!("INSERT INTO {} (id) VALUES (?)", self.table);

        db.execute(&statement, &[canonical.as_str()])
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => TidemarkError::DuplicateEntry(canonical.clone()),
                DbError::Other(msg) => TidemarkError::Storage(format!(
                    "Failed to record migration {}: {}",
                    canonical, msg
                )),
            })?;

        debug!("Recorded migration {}", canonical);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDatabase;

    fn id(s: &str) -> MigrationId {
        MigrationId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_storage_creates_table_once() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::new();

        ledger.ensure_storage(&mut db).await.unwrap();
        assert!(db.has_table("migrations"));

        // Second call finds the table and leaves it alone.
        ledger.ensure_storage(&mut db).await.unwrap();
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_storage_failure_is_storage_error() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::new().fail_storage();

        let err = ledger.ensure_storage(&mut db).await.unwrap_err();
        assert!(matches!(err, TidemarkError::Storage(_)));
    }

    #[tokio::test]
    async fn test_last_applied_on_fresh_ledger_is_none() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::new();
        ledger.ensure_storage(&mut db).await.unwrap();

        assert_eq!(ledger.last_applied(&mut db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_applied_is_maximum_not_latest_insert() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::with_ledger(&["20200103000000", "20200101000000"]);

        let last = ledger.last_applied(&mut db).await.unwrap();
        assert_eq!(last, Some(id("20200103000000")));
    }

    #[tokio::test]
    async fn test_last_applied_rejects_corrupt_value() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::with_ledger(&["not-a-date"]);

        let err = ledger.last_applied(&mut db).await.unwrap_err();
        match err {
            TidemarkError::Storage(msg) => assert!(msg.contains("not-a-date")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_record_appends_canonical_id() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::new();
        ledger.ensure_storage(&mut db).await.unwrap();

        ledger.record(&mut db, id("20200101000000")).await.unwrap();
        ledger.record(&mut db, id("20200102000000")).await.unwrap();

        assert_eq!(db.ledger(), ["20200101000000", "20200102000000"]);
        assert_eq!(
            ledger.last_applied(&mut db).await.unwrap(),
            Some(id("20200102000000"))
        );
    }

    #[tokio::test]
    async fn test_record_duplicate_is_duplicate_entry() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::with_ledger(&["20200101000000"]);

        let err = ledger
            .record(&mut db, id("20200101000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, TidemarkError::DuplicateEntry(ref v) if v == "20200101000000"));
        assert_eq!(db.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_record_write_failure_is_storage_error() {
        let ledger = Ledger::default();
        let mut db = MemoryDatabase::with_ledger(&[]).fail_storage();

        let err = ledger
            .record(&mut db, id("20200101000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, TidemarkError::Storage(_)));
    }
}
