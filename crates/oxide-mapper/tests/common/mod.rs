#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use oxide_mapper::{Database, Deadline, Entity, ExecOutcome, Executor, RowSet};
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};

#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct User {
    #[column("id,pk,autoincrement,table=users")]
    pub id: i64,
    pub name: String,
    pub karma: Option<f64>,
    pub suspended: bool,
    #[column("-")]
    pub note: String,
}

#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Order {
    #[column("id,pk,autoincrement,table=orders")]
    pub id: i64,
    #[column("ref_id")]
    pub reference: String,
    #[column("oneToMany=order_id")]
    pub items: Vec<Box<OrderItem>>,
}

#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct OrderItem {
    #[column("id,pk,autoincrement,table=order_items")]
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub price: f64,
    pub qty: i32,
    #[column("oneToOne=order_id")]
    pub order: Option<Order>,
}

/// Mapped to a table but without a primary key.
#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Tweet {
    #[column("id,table=tweets")]
    pub id: i64,
    pub message: String,
}

/// Declares a one-to-many association on a field that cannot hold it.
#[derive(Debug, Default, Clone, Entity)]
pub struct BadOrder {
    #[column("id,pk,table=orders")]
    pub id: i64,
    #[column("oneToMany=order_id")]
    pub items: Option<OrderItem>,
}

#[derive(Debug, Default, Clone, Entity)]
pub struct Attachment {
    #[column("id,pk,table=attachments")]
    pub id: i64,
    pub data: Vec<u8>,
}

#[derive(Debug, Default, Clone, Entity)]
pub struct Event {
    #[column("id,pk,table=events")]
    pub id: i64,
    #[column("happened_at")]
    pub at: NaiveDateTime,
}

/// Placeholder values for `:id`.
#[derive(Debug, Default, Clone, Entity)]
pub struct ById {
    pub id: i64,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, karma REAL, suspended INTEGER NOT NULL DEFAULT 0)",
    "INSERT INTO users (id, name, karma, suspended) VALUES (1, 'Oliver', 42.13, 0), (2, 'Sandra', 57.19, 1)",
    "CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, ref_id TEXT NOT NULL)",
    "INSERT INTO orders (id, ref_id) VALUES (1, 'APPLE1'), (2, 'OFFICE1'), (3, 'EMPTY1')",
    "CREATE TABLE order_items (id INTEGER PRIMARY KEY AUTOINCREMENT, order_id INTEGER NOT NULL, name TEXT NOT NULL, price REAL NOT NULL, qty INTEGER NOT NULL)",
    "INSERT INTO order_items (id, order_id, name, price, qty) VALUES (1, 1, 'Apple iMac', 1499.0, 1), (2, 1, 'Apple Magic Mouse', 79.0, 2), (3, 2, 'Desk', 399.0, 1), (4, 2, 'Chair', 249.0, 4)",
    "CREATE TABLE tweets (id INTEGER NOT NULL, message TEXT NOT NULL)",
    "INSERT INTO tweets (id, message) VALUES (1, 'hello')",
];

/// An in-memory database seeded with users, orders and order items.
pub async fn create_test_pool() -> SqlitePool {
    let mut pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    for sql in SCHEMA {
        Executor::execute(&mut pool, sql)
            .await
            .unwrap_or_else(|e| panic!("Failed to run {sql}: {e}"));
    }
    pool
}

/// Pool wrapper counting every query that returns rows.
#[derive(Debug, Clone)]
pub struct CountingDb {
    pub pool: SqlitePool,
    fetches: Arc<AtomicUsize>,
}

impl CountingDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Executor for CountingDb {
    async fn execute(&mut self, sql: &str) -> oxide_mapper::Result<ExecOutcome> {
        Executor::execute(&mut self.pool, sql).await
    }

    async fn fetch(&mut self, sql: &str) -> oxide_mapper::Result<RowSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Executor::fetch(&mut self.pool, sql).await
    }

    async fn fetch_within(&mut self, sql: &str, deadline: Deadline) -> oxide_mapper::Result<RowSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pool.fetch_within(sql, deadline).await
    }
}

/// Executor wrapper counting the queries run through it, such as an open
/// transaction.
#[derive(Debug)]
pub struct Counted<X> {
    pub inner: X,
    pub fetches: usize,
}

impl<X> Counted<X> {
    pub const fn new(inner: X) -> Self {
        Self { inner, fetches: 0 }
    }
}

impl<X: Executor> Executor for Counted<X> {
    async fn execute(&mut self, sql: &str) -> oxide_mapper::Result<ExecOutcome> {
        self.inner.execute(sql).await
    }

    async fn fetch(&mut self, sql: &str) -> oxide_mapper::Result<RowSet> {
        self.fetches += 1;
        self.inner.fetch(sql).await
    }
}

impl Database for CountingDb {
    type Transaction = sqlx::Transaction<'static, Sqlite>;

    async fn begin(&self) -> oxide_mapper::Result<Self::Transaction> {
        Database::begin(&self.pool).await
    }
}
