//! Batched eager loading of association fields.
//!
//! For every requested association, the keys of all parents are collected
//! and the far table is queried once with `WHERE <column> IN (<keys>)`. The
//! children are then handed back to each parent, which keeps the ones whose
//! key matches its own. Matching is a linear scan of the batch per parent.
//! Only the associations of the parents themselves are loaded; the
//! children's own associations are left empty.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::db::{Executor, RowSet};
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::exec::Context;
use crate::query::Query;
use crate::quote::quote;
use crate::registry::{OneToMany, OneToOne, TypeDescriptor};
use crate::scan::scan_all;
use crate::value::Value;

/// Children fetched by one batch query, each with the key it matches on.
pub struct Children {
    keys: Vec<Value>,
    items: Box<dyn Any>,
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Children")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl Children {
    /// Scans `rows` into `C`, keying each child by its `key_field` value.
    ///
    /// # Errors
    ///
    /// Fails with `Conversion` when a column does not fit its field.
    pub fn hydrate<C: Entity>(
        descriptor: &TypeDescriptor,
        rows: &RowSet,
        key_field: &str,
    ) -> Result<Self> {
        let items: Vec<C> = scan_all(descriptor, rows)?;
        let keys = items
            .iter()
            .map(|child| child.field_value(key_field).unwrap_or(Value::Null))
            .collect();
        Ok(Self {
            keys,
            items: Box::new(items),
        })
    }

    /// Number of children in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn items<C: Entity>(&self, owner: &'static str, field: &str) -> Result<&[C]> {
        self.items
            .downcast_ref::<Vec<C>>()
            .map(Vec::as_slice)
            .ok_or_else(|| OrmError::AssociationShape {
                type_name: owner,
                field: field.to_string(),
            })
    }

    /// Children whose key equals `key`, in result order.
    ///
    /// # Errors
    ///
    /// Fails with `AssociationShape` when the batch holds another type.
    pub fn matching<C: Entity + Clone>(
        &self,
        owner: &'static str,
        field: &str,
        key: &Value,
    ) -> Result<Vec<C>> {
        Ok(self
            .items::<C>(owner, field)?
            .iter()
            .zip(&self.keys)
            .filter(|(_, k)| k.key_eq(key))
            .map(|(child, _)| child.clone())
            .collect())
    }

    /// The first child whose key equals `key`.
    ///
    /// # Errors
    ///
    /// Fails with `AssociationShape` when the batch holds another type.
    pub fn first<C: Entity + Clone>(
        &self,
        owner: &'static str,
        field: &str,
        key: &Value,
    ) -> Result<Option<C>> {
        Ok(self
            .items::<C>(owner, field)?
            .iter()
            .zip(&self.keys)
            .find(|(_, k)| k.key_eq(key))
            .map(|(child, _)| child.clone()))
    }
}

/// Loads the `includes` associations of every parent.
///
/// Names that are not associations of `E` are skipped.
pub(crate) async fn resolve<E: Entity, X: Executor>(
    ctx: &Context,
    exec: &mut X,
    parents: &mut [&mut E],
    includes: &[String],
) -> Result<()> {
    if includes.is_empty() || parents.is_empty() {
        return Ok(());
    }
    let descriptor = ctx.registry.describe_entity::<E>()?;

    let mut seen = HashSet::new();
    for name in includes {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if let Some(assoc) = descriptor.one_to_many(name) {
            load_one_to_many(ctx, exec, &descriptor, assoc, parents).await?;
        } else if let Some(assoc) = descriptor.one_to_one(name) {
            load_one_to_one(ctx, exec, &descriptor, assoc, parents).await?;
        } else {
            debug!(type_name = E::TYPE_NAME, include = %name, "Ignoring unknown association");
        }
    }
    Ok(())
}

async fn load_one_to_many<E: Entity, X: Executor>(
    ctx: &Context,
    exec: &mut X,
    descriptor: &TypeDescriptor,
    assoc: &OneToMany,
    parents: &mut [&mut E],
) -> Result<()> {
    let target = assoc.target()?;
    let child = (target.describe)(&ctx.registry)?;
    let table = child.require_table()?;
    let column = assoc.column_name(&ctx.registry)?;
    let pk = descriptor.require_primary_key()?;

    let keys: Vec<Value> = parents
        .iter()
        .map(|parent| parent.field_value(pk.name).unwrap_or(Value::Null))
        .collect();
    let rows = fetch_batch(ctx, exec, table, &column, &keys).await?;
    let children = (target.hydrate)(&child, &rows, &assoc.foreign_key_field)?;
    debug!(
        association = assoc.field,
        parents = parents.len(),
        children = children.len(),
        "Loaded one-to-many"
    );

    for (parent, key) in parents.iter_mut().zip(&keys) {
        parent.assign_association(assoc.field, &children, key)?;
    }
    Ok(())
}

async fn load_one_to_one<E: Entity, X: Executor>(
    ctx: &Context,
    exec: &mut X,
    descriptor: &TypeDescriptor,
    assoc: &OneToOne,
    parents: &mut [&mut E],
) -> Result<()> {
    let target = assoc.target()?;
    let far = (target.describe)(&ctx.registry)?;
    let table = far.require_table()?;
    let far_pk = far.require_primary_key()?;
    let local = descriptor
        .field(&assoc.foreign_key_field)
        .filter(|f| !f.transient)
        .ok_or_else(|| {
            OrmError::mapping(
                descriptor.type_name(),
                assoc.field,
                format!("no column field named `{}`", assoc.foreign_key_field),
            )
        })?;

    let keys: Vec<Value> = parents
        .iter()
        .map(|parent| parent.field_value(local.name).unwrap_or(Value::Null))
        .collect();
    let rows = fetch_batch(ctx, exec, table, &far_pk.column, &keys).await?;
    let children = (target.hydrate)(&far, &rows, far_pk.name)?;
    debug!(
        association = assoc.field,
        parents = parents.len(),
        children = children.len(),
        "Loaded one-to-one"
    );

    for (parent, key) in parents.iter_mut().zip(&keys) {
        parent.assign_association(assoc.field, &children, key)?;
    }
    Ok(())
}

/// One `SELECT * ... IN (...)` over the distinct non-null keys.
///
/// No query is issued when every key is null.
async fn fetch_batch<X: Executor>(
    ctx: &Context,
    exec: &mut X,
    table: &str,
    column: &str,
    keys: &[Value],
) -> Result<RowSet> {
    let dialect = ctx.dialect.as_ref();
    let mut distinct = HashSet::new();
    let mut values = Vec::new();
    for key in keys.iter().filter(|k| !k.is_null()) {
        if distinct.insert(quote(dialect, key)?) {
            values.push(key.clone());
        }
    }
    if values.is_empty() {
        return Ok(RowSet::default());
    }

    let sql = Query::table(dialect.quote_identifier(table))
        .is_in(dialect.quote_identifier(column), values)
        .to_sql(dialect)?;
    ctx.fetch(exec, &sql).await
}
