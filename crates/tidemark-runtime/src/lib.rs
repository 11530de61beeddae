pub mod db;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::{Database, DbError, MySqlDatabase, StatementOutcome};
pub use migrations::{ApplyReport, MigrationPlan, MigrationRunner, RunMode};
