//! INSERT, UPDATE and DELETE text for a described entity.

use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::quote::quote;
use crate::registry::{FieldDescriptor, TypeDescriptor};
use crate::value::Value;

fn value_of<E: Entity>(entity: &E, field: &FieldDescriptor) -> Value {
    entity.field_value(field.name).unwrap_or(Value::Null)
}

/// `INSERT INTO <table> (<cols>) VALUES (<vals>)` over every non-transient,
/// non-auto-increment column in declaration order.
///
/// On dialects that cannot report a generated key, `RETURNING <column>` is
/// appended for the auto-increment field.
///
/// # Errors
///
/// Fails with `NoTableName` when the type declares no table and with
/// `UnsupportedType` when a field value cannot be quoted.
pub fn generate_insert<E: Entity>(
    dialect: &dyn Dialect,
    descriptor: &TypeDescriptor,
    entity: &E,
) -> Result<String> {
    let table = dialect.quote_identifier(descriptor.require_table()?);

    let mut columns = Vec::new();
    let mut values = Vec::new();
    for field in descriptor.columns().filter(|f| !f.auto_increment) {
        columns.push(dialect.quote_identifier(&field.column));
        values.push(quote(dialect, &value_of(entity, field))?);
    }

    let mut sql = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        )
    };
    if !dialect.supports_last_insert_id() {
        if let Some(field) = descriptor.auto_increment_field() {
            sql.push_str(" RETURNING ");
            sql.push_str(&dialect.quote_identifier(&field.column));
        }
    }
    Ok(sql)
}

fn primary_key_condition<E: Entity>(
    dialect: &dyn Dialect,
    descriptor: &TypeDescriptor,
    entity: &E,
) -> Result<String> {
    let pk = descriptor.require_primary_key()?;
    Ok(format!(
        "{}={}",
        dialect.quote_identifier(&pk.column),
        quote(dialect, &value_of(entity, pk))?
    ))
}

/// `UPDATE <table> SET <col>=<val>, ... WHERE <pk>=<val>` over every
/// non-transient column except the primary key.
///
/// # Errors
///
/// Fails with `NoTableName`, `NoPrimaryKey`, `UnsupportedType`, or with
/// `Mapping` when the primary key is the only column.
pub fn generate_update<E: Entity>(
    dialect: &dyn Dialect,
    descriptor: &TypeDescriptor,
    entity: &E,
) -> Result<String> {
    let table = dialect.quote_identifier(descriptor.require_table()?);
    let condition = primary_key_condition(dialect, descriptor, entity)?;

    let assignments = descriptor
        .columns()
        .filter(|f| !f.primary_key)
        .map(|field| {
            Ok(format!(
                "{}={}",
                dialect.quote_identifier(&field.column),
                quote(dialect, &value_of(entity, field))?
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    if assignments.is_empty() {
        return Err(OrmError::mapping(
            descriptor.type_name(),
            descriptor.require_primary_key()?.name,
            "no columns besides the primary key to update",
        ));
    }

    Ok(format!(
        "UPDATE {table} SET {} WHERE {condition}",
        assignments.join(", ")
    ))
}

/// `DELETE FROM <table> WHERE <pk>=<val>`.
///
/// # Errors
///
/// Fails with `NoTableName`, `NoPrimaryKey` or `UnsupportedType`.
pub fn generate_delete<E: Entity>(
    dialect: &dyn Dialect,
    descriptor: &TypeDescriptor,
    entity: &E,
) -> Result<String> {
    let table = dialect.quote_identifier(descriptor.require_table()?);
    let condition = primary_key_condition(dialect, descriptor, entity)?;
    Ok(format!("DELETE FROM {table} WHERE {condition}"))
}
