//! Rendering values as inline SQL literals.
//!
//! Statements are assembled as text with every value inlined, so this is the
//! one place where escaping happens. The set of renderable kinds is closed:
//! anything else is refused with [`OrmError::UnsupportedType`].

use crate::dialect::Dialect;
use crate::error::{OrmError, Result};
use crate::value::Value;

/// Layout of rendered date-times. Sub-second precision and offsets are dropped.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders `value` as a SQL literal for `dialect`.
///
/// # Errors
///
/// Returns [`OrmError::UnsupportedType`] for blobs and non-finite floats.
pub fn quote(dialect: &dyn Dialect, value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::from("NULL")),
        Value::Bool(b) => Ok(String::from(if *b { "1" } else { "0" })),
        Value::Int(n) => Ok(n.to_string()),
        Value::UInt(n) => Ok(n.to_string()),
        Value::Float(f) if f.is_finite() => Ok(format!("{f:.6}")),
        Value::Float(_) => Err(OrmError::UnsupportedType("non-finite float")),
        Value::Text(s) => Ok(format!("'{}'", dialect.escape_string(s))),
        Value::DateTime(dt) => Ok(format!("'{}'", dt.format(DATETIME_FORMAT))),
        Value::Blob(_) => Err(OrmError::UnsupportedType(value.kind())),
    }
}

/// Renders each value and joins them with `,`.
pub(crate) fn quote_list(dialect: &dyn Dialect, values: &[Value]) -> Result<String> {
    let quoted = values
        .iter()
        .map(|v| quote(dialect, v))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(","))
}
