//! The bookkeeping table that records applied versions.

use chrono::NaiveDateTime;
use oxide_mapper::{Database, Entity, Executor, OrmError, Query, Session};
use tracing::debug;

use crate::error::Result;

/// Name of the bookkeeping table unless configured otherwise.
pub const DEFAULT_TABLE: &str = "dapper_migrations";

/// One applied migration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Entity)]
pub struct SchemaVersion {
    /// Numeric prefix of the applied file.
    #[column("version,pk,table=dapper_migrations")]
    pub version: i64,
    /// When the version was (last) applied.
    pub created: NaiveDateTime,
}

/// Reads and writes the bookkeeping table through a session.
#[derive(Debug)]
pub struct MigrationHistory<'s, D> {
    session: &'s Session<D>,
    table: &'s str,
}

impl<'s, D: Database> MigrationHistory<'s, D> {
    /// Creates a history over `table`.
    pub const fn new(session: &'s Session<D>, table: &'s str) -> Self {
        Self { session, table }
    }

    /// Creates the bookkeeping table if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails with the database error.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = self.session.sql_dialect().create_migration_table_sql(self.table);
        self.session.execute(&sql).await?;
        debug!(table = self.table, "Ensured migration table");
        Ok(())
    }

    /// The highest recorded version, or `None` if nothing has been applied.
    ///
    /// # Errors
    ///
    /// Fails with the database error.
    pub async fn current_version(&self) -> Result<Option<i64>> {
        let dialect = self.session.sql_dialect();
        let sql = Query::table(dialect.quote_identifier(self.table))
            .project(["version"])
            .order_by_desc("version")
            .take(1)
            .to_sql(dialect)?;
        match self.session.find(sql).scalar::<i64>().await {
            Ok(version) => Ok(Some(version)),
            Err(OrmError::NoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Every recorded version in ascending order.
    ///
    /// # Errors
    ///
    /// Fails with the database error or a conversion error on a malformed row.
    pub async fn applied(&self) -> Result<Vec<SchemaVersion>> {
        let dialect = self.session.sql_dialect();
        let sql = Query::table(dialect.quote_identifier(self.table))
            .order_by_asc("version")
            .to_sql(dialect)?;
        Ok(self.session.find(sql).all().await?)
    }

    /// Records `version` inside `tx`, refreshing its timestamp if present.
    ///
    /// # Errors
    ///
    /// Fails with the database error.
    pub async fn record_tx<X: Executor>(&self, tx: &mut X, version: i64) -> Result<()> {
        let sql = self
            .session
            .sql_dialect()
            .upsert_migration_version_sql(self.table, version);
        self.session.execute_tx(tx, &sql).await?;
        Ok(())
    }
}
