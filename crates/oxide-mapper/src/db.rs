//! Database handles.
//!
//! The mapper only needs to run a statement and get row counts back, run a
//! query and get rows of [`Value`]s back, and open a transaction. Those needs
//! are the [`Executor`], [`Database`] and [`Transaction`] traits; `sqlx`'s
//! SQLite pool and transactions implement them.
//!
//! A call bounded by a [`Deadline`] is interrupted inside SQLite once the
//! deadline passes, so the connection is free again when the call returns.

use std::future::Future;
use std::time::{Duration, Instant};

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqliteQueryResult, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{OrmError, Result};
use crate::value::Value;

/// Virtual machine steps between two deadline checks in SQLite.
const PROGRESS_STEPS: i32 = 1000;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Row id generated by an INSERT, where the engine reports one.
    pub last_insert_id: Option<i64>,
}

/// A fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// One vector of values per row, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Creates a result set.
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    fn from_sqlite(rows: &[SqliteRow]) -> Result<Self> {
        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_column(row, i)).collect())
            .collect::<Result<Vec<Vec<Value>>>>()?;
        Ok(Self { columns, rows })
    }
}

/// Decodes a SQLite column by the storage class of the value it holds.
fn decode_column(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let value = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => Value::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

fn outcome(done: &SqliteQueryResult) -> ExecOutcome {
    ExecOutcome {
        rows_affected: done.rows_affected(),
        last_insert_id: Some(done.last_insert_rowid()),
    }
}

/// Point in time after which a database call gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    limit: Duration,
    at: Instant,
}

impl Deadline {
    /// A deadline `limit` from now.
    #[must_use]
    pub fn after(limit: Duration) -> Self {
        Self {
            limit,
            at: Instant::now() + limit,
        }
    }

    /// The budget the deadline was created with.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Returns `true` once the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Awaits `call`, abandoning it with [`OrmError::Timeout`] at the deadline.
    ///
    /// The abandoned call is only dropped; the database may keep working on it.
    ///
    /// # Errors
    ///
    /// Fails with `Timeout` or the error of `call`.
    pub async fn race<T>(self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout_at(tokio::time::Instant::from_std(self.at), call)
            .await
            .map_err(|_| OrmError::Timeout(self.limit))?
    }

    /// Turns the failure of an interrupted call into [`OrmError::Timeout`].
    fn settle<T>(self, result: std::result::Result<T, sqlx::Error>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(_) if self.expired() => Err(OrmError::Timeout(self.limit)),
            Err(err) => Err(err.into()),
        }
    }
}

/// Something SQL text can be run against: a pool or an open transaction.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Runs a statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<ExecOutcome>;

    /// Runs a query and materializes every row.
    async fn fetch(&mut self, sql: &str) -> Result<RowSet>;

    /// [`Executor::execute`] bounded by `deadline`.
    ///
    /// The default races the call against the deadline; executors that can
    /// stop a running statement override it.
    async fn execute_within(&mut self, sql: &str, deadline: Deadline) -> Result<ExecOutcome> {
        deadline.race(self.execute(sql)).await
    }

    /// [`Executor::fetch`] bounded by `deadline`.
    async fn fetch_within(&mut self, sql: &str, deadline: Deadline) -> Result<RowSet> {
        deadline.race(self.fetch(sql)).await
    }
}

/// An open transaction. Dropping it without committing rolls it back.
#[allow(async_fn_in_trait)]
pub trait Transaction: Executor {
    /// Commits the transaction.
    async fn commit(self) -> Result<()>;

    /// Rolls the transaction back.
    async fn rollback(self) -> Result<()>;
}

/// A shared database handle that can open transactions.
#[allow(async_fn_in_trait)]
pub trait Database: Executor + Clone {
    /// Transaction type opened by [`Database::begin`].
    type Transaction: Transaction;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Self::Transaction>;
}

impl<T: Executor> Executor for &mut T {
    async fn execute(&mut self, sql: &str) -> Result<ExecOutcome> {
        (**self).execute(sql).await
    }

    async fn fetch(&mut self, sql: &str) -> Result<RowSet> {
        (**self).fetch(sql).await
    }

    async fn execute_within(&mut self, sql: &str, deadline: Deadline) -> Result<ExecOutcome> {
        (**self).execute_within(sql, deadline).await
    }

    async fn fetch_within(&mut self, sql: &str, deadline: Deadline) -> Result<RowSet> {
        (**self).fetch_within(sql, deadline).await
    }
}

/// Makes SQLite interrupt whatever runs on `conn` once `deadline` passes.
async fn arm(conn: &mut SqliteConnection, deadline: Deadline) -> Result<()> {
    let at = deadline.at;
    conn.lock_handle()
        .await?
        .set_progress_handler(PROGRESS_STEPS, move || Instant::now() < at);
    Ok(())
}

async fn disarm(conn: &mut SqliteConnection) -> Result<()> {
    conn.lock_handle().await?.remove_progress_handler();
    Ok(())
}

/// A pooled connection that is closed instead of returned to the pool if
/// dropped while its progress handler is installed.
struct Bounded {
    conn: PoolConnection<Sqlite>,
    armed: bool,
}

impl Bounded {
    async fn acquire(pool: &SqlitePool, deadline: Deadline) -> Result<Self> {
        let mut bounded = Self {
            conn: pool.acquire().await?,
            armed: false,
        };
        arm(&mut bounded.conn, deadline).await?;
        bounded.armed = true;
        Ok(bounded)
    }

    async fn release(&mut self) -> Result<()> {
        disarm(&mut self.conn).await?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for Bounded {
    fn drop(&mut self) {
        if self.armed {
            self.conn.close_on_drop();
        }
    }
}

impl Executor for SqlitePool {
    async fn execute(&mut self, sql: &str) -> Result<ExecOutcome> {
        let done = sqlx::query(sql).execute(&*self).await?;
        Ok(outcome(&done))
    }

    async fn fetch(&mut self, sql: &str) -> Result<RowSet> {
        let rows = sqlx::query(sql).fetch_all(&*self).await?;
        RowSet::from_sqlite(&rows)
    }

    async fn execute_within(&mut self, sql: &str, deadline: Deadline) -> Result<ExecOutcome> {
        let mut bounded = Bounded::acquire(self, deadline).await?;
        let done = sqlx::query(sql).execute(&mut *bounded.conn).await;
        bounded.release().await?;
        deadline.settle(done).map(|done| outcome(&done))
    }

    async fn fetch_within(&mut self, sql: &str, deadline: Deadline) -> Result<RowSet> {
        let mut bounded = Bounded::acquire(self, deadline).await?;
        let rows = sqlx::query(sql).fetch_all(&mut *bounded.conn).await;
        bounded.release().await?;
        RowSet::from_sqlite(&deadline.settle(rows)?)
    }
}

impl Database for SqlitePool {
    type Transaction = sqlx::Transaction<'static, Sqlite>;

    async fn begin(&self) -> Result<Self::Transaction> {
        Ok(sqlx::Pool::begin(self).await?)
    }
}

// A bounded call dropped mid-flight leaves its progress handler on the
// transaction's connection until the next bounded call replaces it.
impl Executor for sqlx::Transaction<'static, Sqlite> {
    async fn execute(&mut self, sql: &str) -> Result<ExecOutcome> {
        let done = sqlx::query(sql).execute(&mut **self).await?;
        Ok(outcome(&done))
    }

    async fn fetch(&mut self, sql: &str) -> Result<RowSet> {
        let rows = sqlx::query(sql).fetch_all(&mut **self).await?;
        RowSet::from_sqlite(&rows)
    }

    async fn execute_within(&mut self, sql: &str, deadline: Deadline) -> Result<ExecOutcome> {
        let conn: &mut SqliteConnection = self;
        arm(conn, deadline).await?;
        let done = sqlx::query(sql).execute(&mut *conn).await;
        disarm(conn).await?;
        deadline.settle(done).map(|done| outcome(&done))
    }

    async fn fetch_within(&mut self, sql: &str, deadline: Deadline) -> Result<RowSet> {
        let conn: &mut SqliteConnection = self;
        arm(conn, deadline).await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await;
        disarm(conn).await?;
        RowSet::from_sqlite(&deadline.settle(rows)?)
    }
}

impl Transaction for sqlx::Transaction<'static, Sqlite> {
    async fn commit(self) -> Result<()> {
        Ok(sqlx::Transaction::commit(self).await?)
    }

    async fn rollback(self) -> Result<()> {
        Ok(sqlx::Transaction::rollback(self).await?)
    }
}
