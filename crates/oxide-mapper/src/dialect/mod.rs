//! SQL dialect support.
//!
//! Engines disagree on identifier quoting, string-literal escaping, whether
//! an insert reports the generated key, and how `LIMIT`/`OFFSET` is spelled.
//! This module provides a trait for that engine-specific behavior.

use std::fmt;

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::PostgreSql;
pub use sqlite::Sqlite3;

/// Trait for SQL dialect-specific behavior.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quotes a table or column name, doubling any embedded quote character.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for c in name.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// Escapes the body of a string literal (without the surrounding quotes).
    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// Returns whether executing an INSERT reports the generated row id.
    ///
    /// Dialects returning `false` get `RETURNING <column>` appended instead.
    fn supports_last_insert_id(&self) -> bool {
        true
    }

    /// Renders the `LIMIT`/`OFFSET` clause, `None` when neither is set.
    fn limit_clause(&self, take: Option<u64>, skip: Option<u64>) -> Option<String> {
        match (take, skip) {
            (None, None | Some(0)) => None,
            (Some(take), None | Some(0)) => Some(format!("LIMIT {take}")),
            (take, Some(skip)) => Some(format!(
                "LIMIT {} OFFSET {skip}",
                take.unwrap_or(i64::MAX.unsigned_abs())
            )),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for the migration bookkeeping table.
    fn create_migration_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (version INTEGER NOT NULL PRIMARY KEY, created TIMESTAMP NOT NULL)",
            self.quote_identifier(table)
        )
    }

    /// Inserts `version` into the bookkeeping table, refreshing `created` if
    /// the version is already recorded.
    fn upsert_migration_version_sql(&self, table: &str, version: i64) -> String;
}

/// Escapes backslashes and single quotes with a backslash.
pub(crate) fn backslash_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting_per_dialect() {
        assert_eq!(MySql.quote_identifier("Address"), "`Address`");
        assert_eq!(Sqlite3.quote_identifier("Address"), "`Address`");
        assert_eq!(PostgreSql.quote_identifier("Address"), "\"Address\"");
    }

    #[test]
    fn test_embedded_identifier_quote_is_doubled() {
        assert_eq!(PostgreSql.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Sqlite3.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_string_escaping_families() {
        assert_eq!(Sqlite3.escape_string("Mc'Allister"), "Mc''Allister");
        assert_eq!(MySql.escape_string("Mc'Allister"), "Mc\\'Allister");
        assert_eq!(PostgreSql.escape_string("Mc'Allister"), "Mc\\'Allister");
        assert_eq!(MySql.escape_string("C:\\temp"), "C:\\\\temp");
        assert_eq!(Sqlite3.escape_string("C:\\temp"), "C:\\temp");
    }

    #[test]
    fn test_last_insert_id_support() {
        assert!(MySql.supports_last_insert_id());
        assert!(Sqlite3.supports_last_insert_id());
        assert!(!PostgreSql.supports_last_insert_id());
    }

    #[test]
    fn test_limit_clause() {
        assert_eq!(Sqlite3.limit_clause(None, None), None);
        assert_eq!(Sqlite3.limit_clause(Some(10), None).as_deref(), Some("LIMIT 10"));
        assert_eq!(
            Sqlite3.limit_clause(Some(10), Some(20)).as_deref(),
            Some("LIMIT 10 OFFSET 20")
        );
        assert_eq!(
            Sqlite3.limit_clause(None, Some(20)),
            Some(format!("LIMIT {} OFFSET 20", i64::MAX))
        );
        assert_eq!(PostgreSql.limit_clause(None, Some(20)).as_deref(), Some("OFFSET 20"));
        assert_eq!(
            PostgreSql.limit_clause(Some(10), Some(20)).as_deref(),
            Some("LIMIT 10 OFFSET 20")
        );
        assert_eq!(MySql.limit_clause(Some(10), Some(20)).as_deref(), Some("LIMIT 20,10"));
        assert_eq!(MySql.limit_clause(Some(10), None).as_deref(), Some("LIMIT 10"));
    }

    #[test]
    fn test_migration_table_sql() {
        assert_eq!(
            Sqlite3.create_migration_table_sql("dapper_migrations"),
            "CREATE TABLE IF NOT EXISTS `dapper_migrations` (version INTEGER NOT NULL PRIMARY KEY, created TIMESTAMP NOT NULL)"
        );
        assert!(PostgreSql
            .create_migration_table_sql("dapper_migrations")
            .contains("\"dapper_migrations\""));
    }
}
