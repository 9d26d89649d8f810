//! # oxide-mapper
//!
//! Maps tagged structs to table rows. Describe a struct once with
//! `#[derive(Entity)]`, then insert, update, delete and query it through a
//! [`Session`]. Declared one-to-one and one-to-many associations are loaded
//! on request with one batched `IN` query per association, never one query
//! per row.
//!
//! Values are quoted and inlined into the SQL text for the session's
//! [`Dialect`](dialect::Dialect); nothing is sent as a bound parameter.
//!
//! ## Mapping
//!
//! ```ignore
//! use oxide_mapper::Entity;
//!
//! #[derive(Debug, Default, Clone, Entity)]
//! pub struct Order {
//!     #[column("id,pk,autoincrement,table=orders")]
//!     pub id: i64,
//!     #[column("ref_id")]
//!     pub reference: String,
//!     #[column("oneToMany=order_id")]
//!     pub items: Vec<OrderItem>,
//!     #[column("-")]
//!     pub dirty: bool,
//! }
//!
//! #[derive(Debug, Default, Clone, Entity)]
//! pub struct OrderItem {
//!     #[column("id,pk,autoincrement,table=order_items")]
//!     pub id: i64,
//!     pub order_id: i64,
//!     pub name: String,
//!     pub price: Option<f64>,
//! }
//! ```
//!
//! A tag is `<column-or-"-">[,pk|primarykey][,autoincrement|serial][,table=<name>]`,
//! or `oneToOne=<local field>` / `oneToMany=<child field>` for association
//! fields. Fields without a tag map to a column of the same name.
//!
//! ## Querying
//!
//! ```ignore
//! use oxide_mapper::Session;
//!
//! let session = Session::new(pool);
//! let order: Order = session.get(1).include("items").fetch().await?;
//! let big: Vec<Order> = session
//!     .find("SELECT * FROM orders WHERE id > :min")
//!     .param("min", 100)
//!     .include("items")
//!     .all()
//!     .await?;
//! let n = session.count("SELECT count(*) FROM orders").await?;
//! ```

extern crate self as oxide_mapper;

mod association;
pub mod db;
pub mod dialect;
mod entity;
mod error;
mod exec;
mod finder;
mod params;
pub mod query;
mod quote;
pub mod registry;
mod scan;
mod session;
pub mod statement;
mod value;

pub use association::Children;
pub use db::{Database, Deadline, ExecOutcome, Executor, RowSet, Transaction};
pub use entity::{AssociationTarget, DescribeFn, Entity, FieldDef, HydrateFn, Mapped, Record};
pub use error::{OrmError, Result};
pub use finder::{Finder, Get};
pub use oxide_mapper_derive::Entity;
pub use params::Bindings;
pub use query::Query;
pub use quote::{quote, DATETIME_FORMAT};
pub use registry::{Registry, TypeDescriptor};
pub use session::Session;
pub use value::{FromValue, ToValue, Value, ValueError};
