pub mod config;
pub mod error;
pub mod migration_id;

pub use config::{DatabaseConfig, MigrationsConfig, TidemarkConfig};
pub use error::{Result, TidemarkError};
pub use migration_id::MigrationId;
