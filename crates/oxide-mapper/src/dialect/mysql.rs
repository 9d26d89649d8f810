//! MySQL dialect.

use super::{backslash_escape, Dialect};

/// MySQL / MariaDB.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn escape_string(&self, value: &str) -> String {
        backslash_escape(value)
    }

    fn limit_clause(&self, take: Option<u64>, skip: Option<u64>) -> Option<String> {
        match (take, skip) {
            (None, None | Some(0)) => None,
            (Some(take), None | Some(0)) => Some(format!("LIMIT {take}")),
            (take, Some(skip)) => Some(format!("LIMIT {skip},{}", take.unwrap_or(u64::MAX))),
        }
    }

    fn upsert_migration_version_sql(&self, table: &str, version: i64) -> String {
        format!(
            "INSERT INTO {} (version, created) VALUES ({version}, NOW()) ON DUPLICATE KEY UPDATE created = NOW()",
            self.quote_identifier(table)
        )
    }
}
