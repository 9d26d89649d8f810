//! Named placeholder substitution.
//!
//! `:name` placeholders in free-form SQL are replaced by the quoted value of
//! the binding with that name. A placeholder is the longest run of
//! `[A-Za-z0-9_]` after the colon, so `:Id` never rewrites the front of
//! `:IdCategory`. `::` is left alone for PostgreSQL casts, and unknown names
//! stay in the text untouched.

use std::collections::HashMap;

use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::Result;
use crate::quote::quote;
use crate::registry::Registry;
use crate::value::{ToValue, Value};

/// Values for `:name` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds every non-transient field of `params` under its Rust field name.
    ///
    /// # Errors
    ///
    /// Fails with `Mapping` when `P` cannot be described.
    pub fn from_entity<P: Entity>(registry: &Registry, params: &P) -> Result<Self> {
        let descriptor = registry.describe_entity::<P>()?;
        let values = descriptor
            .columns()
            .filter_map(|field| {
                params
                    .field_value(field.name)
                    .map(|value| (field.name.to_string(), value))
            })
            .collect();
        Ok(Self { values })
    }

    /// Adds or replaces one binding.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl ToValue) -> Self {
        self.values.insert(name.into(), value.to_value());
        self
    }

    /// Adds every binding of `other`, replacing same-named ones.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.values.extend(other.values);
        self
    }

    /// Value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces every bound placeholder in `sql` with its quoted value.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedType` when a referenced value cannot be quoted.
    pub fn substitute(&self, dialect: &dyn Dialect, sql: &str) -> Result<String> {
        if self.values.is_empty() {
            return Ok(sql.to_string());
        }

        let mut out = String::with_capacity(sql.len());
        let mut rest = sql;
        while let Some(pos) = rest.find(':') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            if let Some(cast) = after.strip_prefix(':') {
                out.push_str("::");
                rest = cast;
                continue;
            }

            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..len];
            match self.values.get(name) {
                Some(value) => out.push_str(&quote(dialect, value)?),
                None => {
                    out.push(':');
                    out.push_str(name);
                }
            }
            rest = &after[len..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, PostgreSql, Sqlite3};
    use crate::error::OrmError;

    #[test]
    fn test_replaces_every_occurrence() {
        let bindings = Bindings::new().set("Id", 1_i64).set("Name", "Oliver");
        let sql = bindings
            .substitute(
                &Sqlite3,
                "select * from users where id=:Id or (name=:Name and id<>:Id)",
            )
            .unwrap();
        assert_eq!(
            sql,
            "select * from users where id=1 or (name='Oliver' and id<>1)"
        );
    }

    #[test]
    fn test_prefix_names_do_not_collide() {
        let bindings = Bindings::new().set("Id", 1_i64).set("IdCategory", 7_i64);
        let sql = bindings
            .substitute(&Sqlite3, "where id=:Id and category=:IdCategory")
            .unwrap();
        assert_eq!(sql, "where id=1 and category=7");

        let only_short = Bindings::new().set("Id", 1_i64);
        let sql = only_short
            .substitute(&Sqlite3, "where category=:IdCategory")
            .unwrap();
        assert_eq!(sql, "where category=:IdCategory");
    }

    #[test]
    fn test_unknown_placeholders_and_casts_are_kept() {
        let bindings = Bindings::new().set("id", 3_i64);
        let sql = bindings
            .substitute(&PostgreSql, "select :id::text, :other, '10:30'")
            .unwrap();
        assert_eq!(sql, "select 3::text, :other, '10:30'");
    }

    #[test]
    fn test_values_are_quoted_for_the_dialect() {
        let bindings = Bindings::new()
            .set("name", "Mc'Allister")
            .set("karma", Some(42.13_f64))
            .set("gone", None::<i64>);
        let sql = bindings
            .substitute(&MySql, "VALUES (:name, :karma, :gone)")
            .unwrap();
        assert_eq!(sql, "VALUES ('Mc\\'Allister', 42.130000, NULL)");
    }

    #[test]
    fn test_empty_bindings_leave_sql_untouched() {
        let sql = Bindings::new()
            .substitute(&Sqlite3, "select * from users where id=:Id")
            .unwrap();
        assert_eq!(sql, "select * from users where id=:Id");
    }

    #[test]
    fn test_unquotable_value_is_an_error() {
        let bindings = Bindings::new().set("data", Value::Blob(vec![0]));
        let err = bindings.substitute(&Sqlite3, "x=:data").unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedType("blob")));
    }
}
