//! Discovers numbered `.sql` files and applies the pending ones.

use std::fs;
use std::path::{Path, PathBuf};

use oxide_mapper::dialect::Dialect;
use oxide_mapper::{Database, Session, Transaction};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::history::{MigrationHistory, DEFAULT_TABLE};

/// File names the runner picks up: a numeric version prefix and a `.sql` suffix.
const FILE_PATTERN: &str = r"^([0-9]+).*\.sql$";

/// A migration script on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Numeric prefix of the file name.
    pub version: i64,
    /// Full path of the script.
    pub path: PathBuf,
}

/// A discovered migration and whether the database already has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// The script.
    pub migration: Migration,
    /// `true` if its version is at or below the recorded version.
    pub applied: bool,
}

/// Lists the migrations in `dir`, ordered by version.
///
/// Files that do not match `<digits>*.sql` are ignored, as are names whose
/// prefix does not fit an `i64`.
///
/// # Errors
///
/// Fails if `dir` is missing or unreadable, or if two files share a version.
pub fn discover(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.is_dir() {
        return Err(MigrateError::MigrationsDirNotFound(dir.to_path_buf()));
    }
    let pattern = Regex::new(FILE_PATTERN)?;

    let mut migrations = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(prefix) = pattern.captures(name).and_then(|c| c.get(1)) else {
            continue;
        };
        match prefix.as_str().parse::<i64>() {
            Ok(version) => migrations.push(Migration { version, path }),
            Err(err) => warn!(file = name, error = %err, "Ignoring migration with oversized version"),
        }
    }

    migrations.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));
    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrateError::DuplicateVersion {
            version: pair[0].version,
            first: pair[0].path.clone(),
            second: pair[1].path.clone(),
        });
    }
    Ok(migrations)
}

/// Splits a script into statements.
///
/// Lines starting with `--` or `#` are dropped first, then the rest is split
/// on `;`. A `;` inside a string literal is not recognized.
#[must_use]
pub fn split_statements(script: &str) -> Vec<String> {
    let body: Vec<&str> = script
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !line.starts_with("--") && !line.starts_with('#')
        })
        .collect();
    body.join("\n")
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(String::from)
        .collect()
}

/// Applies pending migrations from a directory.
///
/// # Example
///
/// ```ignore
/// let applied = Migrator::new(pool, "migrations").verbose(true).run().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Migrator<D> {
    session: Session<D>,
    dir: PathBuf,
    table: String,
    verbose: bool,
}

impl<D: Database> Migrator<D> {
    /// Creates a runner for the scripts in `dir`, using the SQLite dialect.
    pub fn new(db: D, dir: impl Into<PathBuf>) -> Self {
        Self {
            session: Session::new(db),
            dir: dir.into(),
            table: DEFAULT_TABLE.to_string(),
            verbose: false,
        }
    }

    /// Sets the dialect for the bookkeeping statements.
    #[must_use]
    pub fn dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.session = self.session.dialect(dialect);
        self
    }

    /// Records versions in `table` instead of `dapper_migrations`.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Reports each applied and skipped file at `info` level.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Logs every statement at `info` level.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.session = self.session.debug(debug);
        self
    }

    /// The session statements run through.
    pub const fn session(&self) -> &Session<D> {
        &self.session
    }

    /// The bookkeeping table.
    pub fn history(&self) -> MigrationHistory<'_, D> {
        MigrationHistory::new(&self.session, &self.table)
    }

    /// The highest applied version, creating the bookkeeping table if needed.
    ///
    /// # Errors
    ///
    /// Fails with the database error.
    pub async fn current_version(&self) -> Result<Option<i64>> {
        let history = self.history();
        history.ensure_table().await?;
        history.current_version().await
    }

    /// Every discovered migration, flagged applied or pending.
    ///
    /// # Errors
    ///
    /// As [`discover`] and [`Migrator::current_version`].
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let current = self.current_version().await?;
        Ok(discover(&self.dir)?
            .into_iter()
            .map(|migration| MigrationStatus {
                applied: current.is_some_and(|c| migration.version <= c),
                migration,
            })
            .collect())
    }

    /// Migrations newer than the recorded version.
    ///
    /// # Errors
    ///
    /// As [`Migrator::status`].
    pub async fn pending(&self) -> Result<Vec<Migration>> {
        Ok(self
            .status()
            .await?
            .into_iter()
            .filter(|s| !s.applied)
            .map(|s| s.migration)
            .collect())
    }

    /// Applies every pending migration in version order, one transaction
    /// per file, and returns the applied versions.
    ///
    /// Stops at the first failing file; files before it stay applied.
    ///
    /// # Errors
    ///
    /// Fails with `Statement` naming the file and statement that failed, or
    /// with the error from discovery or the bookkeeping table.
    pub async fn run(&self) -> Result<Vec<i64>> {
        let mut applied = Vec::new();
        for status in self.status().await? {
            let Migration { version, path } = &status.migration;
            if status.applied {
                self.report(*version, path, "Skipping migration");
                continue;
            }
            self.report(*version, path, "Applying migration");
            self.apply(&status.migration).await?;
            applied.push(*version);
        }
        info!(count = applied.len(), "Migrations complete");
        Ok(applied)
    }

    async fn apply(&self, migration: &Migration) -> Result<()> {
        let script = tokio::fs::read_to_string(&migration.path).await?;
        let mut tx = self.session.begin().await?;

        for statement in split_statements(&script) {
            if let Err(source) = self.session.execute_tx(&mut tx, &statement).await {
                if let Err(err) = tx.rollback().await {
                    warn!(error = %err, "Rollback failed");
                }
                return Err(MigrateError::Statement {
                    path: migration.path.clone(),
                    statement,
                    source,
                });
            }
        }
        if let Err(err) = self.history().record_tx(&mut tx, migration.version).await {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            return Err(err);
        }
        tx.commit().await?;
        Ok(())
    }

    fn report(&self, version: i64, path: &Path, message: &str) {
        if self.verbose {
            info!(version, path = %path.display(), "{message}");
        } else {
            debug!(version, path = %path.display(), "{message}");
        }
    }
}
