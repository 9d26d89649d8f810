//! # oxide-mapper-migrate
//!
//! Applies numbered `.sql` scripts to a database and records the applied
//! versions in a bookkeeping table (`dapper_migrations` by default).
//!
//! A script named `0003_add_orders.sql` has version 3. Scripts newer than
//! the highest recorded version are applied in ascending order, each in its
//! own transaction together with its bookkeeping row.
//!
//! ```ignore
//! use oxide_mapper_migrate::Migrator;
//!
//! let applied = Migrator::new(pool, "migrations").verbose(true).run().await?;
//! ```

pub mod error;
pub mod history;
pub mod migrator;

pub use error::{MigrateError, Result};
pub use history::{MigrationHistory, SchemaVersion, DEFAULT_TABLE};
pub use migrator::{discover, split_statements, Migration, MigrationStatus, Migrator};
