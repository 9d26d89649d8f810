//! SQLite dialect.

use super::Dialect;

/// SQLite 3.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sqlite3;

impl Dialect for Sqlite3 {
    fn name(&self) -> &'static str {
        "sqlite3"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn upsert_migration_version_sql(&self, table: &str, version: i64) -> String {
        format!(
            "INSERT OR REPLACE INTO {} (version, created) VALUES ({version}, CURRENT_TIMESTAMP)",
            self.quote_identifier(table)
        )
    }
}
