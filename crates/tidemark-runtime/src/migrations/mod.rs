mod executor;
mod ledger;
mod runner;
mod source;

pub use executor::MigrationExecutor;
pub use ledger::{Ledger, LEDGER_TABLE};
pub use runner::{ApplyReport, MigrationPlan, MigrationRunner};
pub use source::{
    pending_after, CandidateSet, MigrationFile, MigrationSource, RunMode, MIGRATION_EXTENSION,
};
