//! PostgreSQL dialect.

use super::{backslash_escape, Dialect};

/// PostgreSQL.
///
/// Inserts read generated keys through `RETURNING`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgreSql;

impl Dialect for PostgreSql {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn escape_string(&self, value: &str) -> String {
        backslash_escape(value)
    }

    fn supports_last_insert_id(&self) -> bool {
        false
    }

    fn limit_clause(&self, take: Option<u64>, skip: Option<u64>) -> Option<String> {
        let skip = skip.filter(|&s| s > 0);
        match (take, skip) {
            (None, None) => None,
            (Some(take), None) => Some(format!("LIMIT {take}")),
            (None, Some(skip)) => Some(format!("OFFSET {skip}")),
            (Some(take), Some(skip)) => Some(format!("LIMIT {take} OFFSET {skip}")),
        }
    }

    fn upsert_migration_version_sql(&self, table: &str, version: i64) -> String {
        format!(
            "INSERT INTO {} (version, created) VALUES ({version}, NOW()) ON CONFLICT (version) DO UPDATE SET created = EXCLUDED.created",
            self.quote_identifier(table)
        )
    }
}
