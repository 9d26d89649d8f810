//! Free-form queries: placeholder binding, scanning and eager loading.

use std::marker::PhantomData;
use std::time::Duration;

use crate::association::resolve;
use crate::db::{Database, Executor};
use crate::entity::{Entity, Record};
use crate::error::{OrmError, Result};
use crate::exec::Context;
use crate::params::Bindings;
use crate::query::Query;
use crate::scan::{scan_all, scan_first};
use crate::session::Session;
use crate::value::{FromValue, ToValue, Value};

/// A query waiting to be run, created by [`Session::find`].
///
/// ```ignore
/// let user: User = session
///     .find("SELECT * FROM users WHERE id = :id")
///     .bind(&UserById { id: 1 })
///     .include("tweets")
///     .single()
///     .await?;
/// ```
#[derive(Debug)]
#[must_use = "a finder does nothing until one of its fetch methods is awaited"]
pub struct Finder<X> {
    ctx: Context,
    exec: X,
    sql: String,
    bindings: Result<Bindings>,
    includes: Vec<String>,
}

impl<X: Executor> Finder<X> {
    pub(crate) fn new(ctx: Context, exec: X, sql: String) -> Self {
        Self {
            ctx,
            exec,
            sql,
            bindings: Ok(Bindings::new()),
            includes: Vec::new(),
        }
    }

    /// Binds every column field of `params` to `:<FieldName>` placeholders.
    pub fn bind<P: Entity>(mut self, params: &P) -> Self {
        let from_params = Bindings::from_entity(&self.ctx.registry, params);
        self.bindings = match (self.bindings, from_params) {
            (Ok(current), Ok(added)) => Ok(current.merge(added)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        self
    }

    /// Binds a single `:<name>` placeholder.
    pub fn param(mut self, name: impl Into<String>, value: impl ToValue) -> Self {
        self.bindings = self.bindings.map(|b| b.set(name, value));
        self
    }

    /// Eager-loads the named association field.
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.includes.push(name.into());
        self
    }

    /// Eager-loads every named association field.
    pub fn include_all<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Overrides the session deadline for this query.
    pub const fn timeout(mut self, limit: Duration) -> Self {
        self.ctx.timeout = Some(limit);
        self
    }

    fn prepare(&mut self) -> Result<String> {
        let bindings = std::mem::replace(&mut self.bindings, Ok(Bindings::new()))?;
        bindings.substitute(self.ctx.dialect.as_ref(), &self.sql)
    }

    /// Fetches the first row.
    ///
    /// # Errors
    ///
    /// Fails with `NoRows` when nothing matches, and with the first error
    /// of binding, execution, scanning or association loading.
    pub async fn single<R: Record>(mut self) -> Result<R> {
        let sql = self.prepare()?;
        let rows = self.ctx.fetch(&mut self.exec, &sql).await?;
        let descriptor = self.ctx.registry.describe::<R>()?;
        let mut entity: R::Entity = scan_first(&descriptor, &rows)?;
        resolve(&self.ctx, &mut self.exec, &mut [&mut entity], &self.includes).await?;
        Ok(R::from_entity(entity))
    }

    /// Fetches every row; no rows is an empty vector.
    ///
    /// Requested associations are loaded with one query per association,
    /// whatever the number of rows.
    ///
    /// # Errors
    ///
    /// Fails with the first error of binding, execution, scanning or
    /// association loading.
    pub async fn all<R: Record>(mut self) -> Result<Vec<R>> {
        let sql = self.prepare()?;
        let rows = self.ctx.fetch(&mut self.exec, &sql).await?;
        let descriptor = self.ctx.registry.describe::<R>()?;
        let mut entities: Vec<R::Entity> = scan_all(&descriptor, &rows)?;
        {
            let mut parents: Vec<&mut R::Entity> = entities.iter_mut().collect();
            resolve(&self.ctx, &mut self.exec, &mut parents, &self.includes).await?;
        }
        Ok(entities.into_iter().map(R::from_entity).collect())
    }

    /// Fetches the first column of the first row.
    ///
    /// # Errors
    ///
    /// Fails with `NoRows` when nothing matches and with `WrongType` when
    /// the value does not convert into `V`.
    pub async fn scalar<V: FromValue>(mut self) -> Result<V> {
        let sql = self.prepare()?;
        let rows = self.ctx.fetch(&mut self.exec, &sql).await?;
        let value = rows.first_value().cloned().ok_or(OrmError::NoRows)?;
        V::from_value(value).map_err(OrmError::WrongType)
    }

    /// Fetches a 64-bit count.
    ///
    /// # Errors
    ///
    /// As [`Finder::scalar`].
    pub async fn count(self) -> Result<i64> {
        self.scalar::<i64>().await
    }
}

/// Lookup of one entity by primary key, created by [`Session::get`].
#[derive(Debug)]
#[must_use = "a lookup does nothing until `fetch` is awaited"]
pub struct Get<'s, D, T> {
    session: &'s Session<D>,
    key: Value,
    includes: Vec<String>,
    entity: PhantomData<fn() -> T>,
}

impl<'s, D: Database, T: Record> Get<'s, D, T> {
    pub(crate) const fn new(session: &'s Session<D>, key: Value) -> Self {
        Self {
            session,
            key,
            includes: Vec::new(),
            entity: PhantomData,
        }
    }

    /// Eager-loads the named association field.
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.includes.push(name.into());
        self
    }

    /// Eager-loads every named association field.
    pub fn include_all<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Runs `SELECT * FROM <table> WHERE <pk>=<key>`.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName` or `NoPrimaryKey` when `T` lacks them and
    /// with `NoRows` when nothing matches.
    pub async fn fetch(self) -> Result<T> {
        let ctx = self.session.context();
        let descriptor = ctx.registry.describe::<T>()?;
        let dialect = ctx.dialect.as_ref();
        let table = descriptor.require_table()?;
        let pk = descriptor.require_primary_key()?;
        let sql = Query::table(dialect.quote_identifier(table))
            .eq(dialect.quote_identifier(&pk.column), self.key)
            .to_sql(dialect)?;
        self.session
            .find(sql)
            .include_all(self.includes)
            .single()
            .await
    }
}
