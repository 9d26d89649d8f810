//! The session: a database handle plus the mapping configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::db::{Database, ExecOutcome, Executor};
use crate::dialect::{Dialect, Sqlite3};
use crate::entity::{Entity, Record};
use crate::error::{OrmError, Result};
use crate::exec::Context;
use crate::finder::{Finder, Get};
use crate::registry::Registry;
use crate::statement::{generate_delete, generate_insert, generate_update};
use crate::value::{ToValue, Value};

/// Entry point for writes and queries against one database handle.
///
/// Calls without a transaction run in autocommit mode on a clone of the
/// handle. The `_tx` variants and [`Session::find_tx`] run on a transaction
/// the caller opened with [`Session::begin`] and later commits or rolls
/// back.
///
/// # Example
///
/// ```ignore
/// let session = Session::new(pool).dialect(Sqlite3).debug(true);
///
/// let mut user = User { name: "George".into(), ..Default::default() };
/// session.insert(&mut user).await?;
/// assert!(user.id > 0);
///
/// let order: Order = session.get(1).include("items").fetch().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Session<D> {
    db: D,
    ctx: Context,
}

impl<D: Database> Session<D> {
    /// Creates a session on `db` with the SQLite dialect and the shared registry.
    pub fn new(db: D) -> Self {
        Self {
            db,
            ctx: Context {
                registry: Registry::shared(),
                dialect: Arc::new(Sqlite3),
                debug: false,
                timeout: None,
            },
        }
    }

    /// Sets the dialect used for quoting and statement shapes.
    #[must_use]
    pub fn dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.ctx.dialect = Arc::new(dialect);
        self
    }

    /// Uses `registry` instead of the shared one.
    #[must_use]
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.ctx.registry = registry;
        self
    }

    /// Logs every statement at `info` level instead of `debug`.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.ctx.debug = debug;
        self
    }

    /// Bounds every database call; expiry fails with `OrmError::Timeout`.
    #[must_use]
    pub const fn timeout(mut self, limit: Duration) -> Self {
        self.ctx.timeout = Some(limit);
        self
    }

    /// The underlying handle.
    pub const fn db(&self) -> &D {
        &self.db
    }

    /// The registry descriptors are looked up in.
    pub fn type_registry(&self) -> &Registry {
        &self.ctx.registry
    }

    /// The dialect statements are written for.
    pub fn sql_dialect(&self) -> &dyn Dialect {
        self.ctx.dialect.as_ref()
    }

    pub(crate) const fn context(&self) -> &Context {
        &self.ctx
    }

    /// Opens a transaction on the handle.
    ///
    /// # Errors
    ///
    /// Fails with the database error.
    pub async fn begin(&self) -> Result<D::Transaction> {
        self.db.begin().await
    }

    /// Inserts `entity` and stores the generated key into its
    /// auto-increment field, if it has one.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName`, `UnsupportedType` or the database error.
    pub async fn insert<E: Entity>(&self, entity: &mut E) -> Result<()> {
        self.insert_tx(&mut self.db.clone(), entity).await
    }

    /// [`Session::insert`] on a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// As [`Session::insert`].
    pub async fn insert_tx<X: Executor, E: Entity>(&self, tx: &mut X, entity: &mut E) -> Result<()> {
        let descriptor = self.ctx.registry.describe_entity::<E>()?;
        let sql = generate_insert(self.ctx.dialect.as_ref(), &descriptor, entity)?;

        let Some(auto) = descriptor.auto_increment_field() else {
            self.ctx.execute(tx, &sql).await?;
            return Ok(());
        };
        let id = if self.ctx.dialect.supports_last_insert_id() {
            self.ctx
                .execute(tx, &sql)
                .await?
                .last_insert_id
                .map(Value::Int)
                .ok_or(OrmError::NoRows)?
        } else {
            self.ctx
                .fetch(tx, &sql)
                .await?
                .first_value()
                .cloned()
                .ok_or(OrmError::NoRows)?
        };

        debug!(type_name = E::TYPE_NAME, field = auto.name, id = ?id, "Stored generated key");
        entity
            .set_field(auto.name, id)
            .map_err(|source| OrmError::Conversion {
                type_name: E::TYPE_NAME,
                column: auto.column.clone(),
                source,
            })?;
        Ok(())
    }

    /// Updates every column of `entity` by primary key, returning the
    /// number of rows changed.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName`, `NoPrimaryKey`, `UnsupportedType` or the
    /// database error; nothing is written on the first three.
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<u64> {
        self.update_tx(&mut self.db.clone(), entity).await
    }

    /// [`Session::update`] on a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// As [`Session::update`].
    pub async fn update_tx<X: Executor, E: Entity>(&self, tx: &mut X, entity: &E) -> Result<u64> {
        let descriptor = self.ctx.registry.describe_entity::<E>()?;
        let sql = generate_update(self.ctx.dialect.as_ref(), &descriptor, entity)?;
        Ok(self.ctx.execute(tx, &sql).await?.rows_affected)
    }

    /// Deletes `entity` by primary key, returning the number of rows removed.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName`, `NoPrimaryKey`, `UnsupportedType` or the
    /// database error.
    pub async fn delete<E: Entity>(&self, entity: &E) -> Result<u64> {
        self.delete_tx(&mut self.db.clone(), entity).await
    }

    /// [`Session::delete`] on a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// As [`Session::delete`].
    pub async fn delete_tx<X: Executor, E: Entity>(&self, tx: &mut X, entity: &E) -> Result<u64> {
        let descriptor = self.ctx.registry.describe_entity::<E>()?;
        let sql = generate_delete(self.ctx.dialect.as_ref(), &descriptor, entity)?;
        Ok(self.ctx.execute(tx, &sql).await?.rows_affected)
    }

    /// Runs a statement that returns no rows, in autocommit mode.
    ///
    /// # Errors
    ///
    /// Fails with the database error or `Timeout`.
    pub async fn execute(&self, sql: &str) -> Result<ExecOutcome> {
        self.execute_tx(&mut self.db.clone(), sql).await
    }

    /// [`Session::execute`] on a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// As [`Session::execute`].
    pub async fn execute_tx<X: Executor>(&self, tx: &mut X, sql: &str) -> Result<ExecOutcome> {
        self.ctx.execute(tx, sql).await
    }

    /// Starts a free-form query in autocommit mode.
    pub fn find(&self, sql: impl Into<String>) -> Finder<D> {
        Finder::new(self.ctx.clone(), self.db.clone(), sql.into())
    }

    /// Starts a free-form query on a caller-owned transaction.
    pub fn find_tx<'t, X: Executor>(&self, tx: &'t mut X, sql: impl Into<String>) -> Finder<&'t mut X> {
        Finder::new(self.ctx.clone(), tx, sql.into())
    }

    /// Looks up a `T` by primary key.
    pub fn get<T: Record>(&self, key: impl ToValue) -> Get<'_, D, T> {
        Get::new(self, key.to_value())
    }

    /// Runs a count query.
    ///
    /// # Errors
    ///
    /// As [`Finder::count`].
    pub async fn count(&self, sql: impl Into<String>) -> Result<i64> {
        self.find(sql).count().await
    }
}
