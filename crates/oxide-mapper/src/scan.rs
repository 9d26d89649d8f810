//! Storing fetched rows into entities.
//!
//! Columns are matched to fields by column name. Columns without a field are
//! skipped and fields without a column keep their default value, so any
//! projection or extra computed column scans cleanly.

use crate::db::RowSet;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::registry::{FieldDescriptor, TypeDescriptor};

/// Resolves each result column to the field it fills, once per result set.
fn column_targets<'d>(descriptor: &'d TypeDescriptor, rows: &RowSet) -> Vec<Option<&'d FieldDescriptor>> {
    rows.columns
        .iter()
        .map(|column| descriptor.field_by_column(column))
        .collect()
}

fn scan_row<E: Entity>(
    targets: &[Option<&FieldDescriptor>],
    columns: &[String],
    row: &[crate::value::Value],
) -> Result<E> {
    let mut entity = E::default();
    for ((target, column), value) in targets.iter().zip(columns).zip(row) {
        let Some(field) = target else {
            continue;
        };
        entity
            .set_field(field.name, value.clone())
            .map_err(|source| OrmError::Conversion {
                type_name: E::TYPE_NAME,
                column: column.clone(),
                source,
            })?;
    }
    Ok(entity)
}

/// Scans every row.
pub(crate) fn scan_all<E: Entity>(descriptor: &TypeDescriptor, rows: &RowSet) -> Result<Vec<E>> {
    let targets = column_targets(descriptor, rows);
    rows.rows
        .iter()
        .map(|row| scan_row(&targets, &rows.columns, row))
        .collect()
}

/// Scans the first row, failing with [`OrmError::NoRows`] when there is none.
pub(crate) fn scan_first<E: Entity>(descriptor: &TypeDescriptor, rows: &RowSet) -> Result<E> {
    let row = rows.rows.first().ok_or(OrmError::NoRows)?;
    scan_row(&column_targets(descriptor, rows), &rows.columns, row)
}
