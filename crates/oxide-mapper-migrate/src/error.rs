//! Error types for the migration runner.

use std::path::PathBuf;

use oxide_mapper::OrmError;

/// Errors that can occur while discovering or applying migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Failure reported by the mapper, including database errors it wraps.
    #[error(transparent)]
    Orm(#[from] OrmError),

    /// Database error outside the mapper, such as a failed connection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error while reading the migrations directory or a script.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The migration file-name pattern failed to compile.
    #[error("Invalid migration file pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// No migrations directory found.
    #[error("Migrations directory not found: {0}")]
    MigrationsDirNotFound(PathBuf),

    /// Two files carry the same version prefix.
    #[error("Migration version {version} is used by both '{}' and '{}'", first.display(), second.display())]
    DuplicateVersion {
        /// The shared version.
        version: i64,
        /// The file seen first.
        first: PathBuf,
        /// The file seen second.
        second: PathBuf,
    },

    /// A statement in a migration script failed; the file was rolled back.
    #[error("Migration '{}' failed on statement `{statement}`: {source}", path.display())]
    Statement {
        /// The script being applied.
        path: PathBuf,
        /// The statement that failed.
        statement: String,
        /// The underlying failure.
        #[source]
        source: OrmError,
    },
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
