//! tidemark - timestamped SQL migrations for MySQL.
//!
//! Migrations are plain `.sql` files named `<YYYYMMDDHHMMSS>_<Name>.sql`.
//! Applied ids are kept in a `migrations` table, and only files newer than
//! the highest recorded id are run.

pub use tidemark_core::{DatabaseConfig, MigrationId, TidemarkConfig, TidemarkError};
pub use tidemark_runtime::migrations::{
    ApplyReport, Ledger, MigrationFile, MigrationPlan, MigrationRunner, MigrationSource, RunMode,
};
pub use tidemark_runtime::{Database, MySqlDatabase};
