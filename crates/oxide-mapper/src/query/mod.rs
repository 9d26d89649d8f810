//! Fluent SELECT builder.
//!
//! Table and column expressions are emitted as written; values are inlined
//! through [`quote`](crate::quote::quote) for the dialect given to
//! [`Query::to_sql`].
//!
//! ```ignore
//! use oxide_mapper::{dialect::Sqlite3, Query};
//!
//! let sql = Query::table("users")
//!     .is_in("id", [1, 2, 3, 4])
//!     .to_sql(&Sqlite3)?;
//! assert_eq!(sql, "SELECT * FROM users WHERE id IN (1,2,3,4)");
//! ```

mod filter;

pub use filter::{CompareOp, Condition};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::value::{ToValue, Value};

/// Order direction for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (ASC)
    Asc,
    /// Descending order (DESC)
    Desc,
}

/// Join flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL OUTER JOIN`
    Full,
    /// `CROSS JOIN`
    Cross,
}

impl JoinKind {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL OUTER JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    kind: JoinKind,
    table: String,
    on: Vec<(String, String)>,
}

/// A SELECT statement under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    alias: Option<String>,
    projection: Vec<String>,
    joins: Vec<Join>,
    conditions: Vec<Condition>,
    order_by: Vec<(String, OrderDirection)>,
    take: Option<u64>,
    skip: Option<u64>,
}

impl Query {
    /// Starts `SELECT * FROM table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            projection: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            take: None,
            skip: None,
        }
    }

    /// Aliases the main table.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Replaces `*` with the given expressions.
    #[must_use]
    pub fn project<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Projects a sub-query under an alias: `(SELECT ...) alias`.
    #[must_use]
    pub fn project_subquery(mut self, sql: &str, alias: &str) -> Self {
        self.projection.push(format!("({sql}) {alias}"));
        self
    }

    fn push_join(mut self, kind: JoinKind, table: String, left: String, right: String) -> Self {
        self.joins.push(Join {
            kind,
            table,
            on: vec![(left, right)],
        });
        self
    }

    /// `INNER JOIN table ON left=right`.
    #[must_use]
    pub fn join(self, table: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.push_join(JoinKind::Inner, table.into(), left.into(), right.into())
    }

    /// `LEFT JOIN table ON left=right`.
    #[must_use]
    pub fn left_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.push_join(JoinKind::Left, table.into(), left.into(), right.into())
    }

    /// `RIGHT JOIN table ON left=right`.
    ///
    /// SQLite accepts this only from 3.39.
    #[must_use]
    pub fn right_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.push_join(JoinKind::Right, table.into(), left.into(), right.into())
    }

    /// `FULL OUTER JOIN table ON left=right`.
    ///
    /// SQLite accepts this only from 3.39; MySQL not at all.
    #[must_use]
    pub fn full_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.push_join(JoinKind::Full, table.into(), left.into(), right.into())
    }

    /// `CROSS JOIN table`.
    #[must_use]
    pub fn cross_join(mut self, table: impl Into<String>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Cross,
            table: table.into(),
            on: Vec::new(),
        });
        self
    }

    /// Adds another `AND left=right` to the most recent join.
    #[must_use]
    pub fn on(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        if let Some(join) = self.joins.last_mut() {
            join.on.push((left.into(), right.into()));
        }
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// `column=value`, or `column IS NULL` for a null value.
    #[must_use]
    pub fn eq(self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.filter(Condition::compare(column, CompareOp::Eq, value))
    }

    /// `column<>value`, or `column IS NOT NULL` for a null value.
    #[must_use]
    pub fn ne(self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.filter(Condition::compare(column, CompareOp::Ne, value))
    }

    /// `column<value`.
    #[must_use]
    pub fn lt(self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.filter(Condition::compare(column, CompareOp::Lt, value))
    }

    /// `column<=value`.
    #[must_use]
    pub fn lte(self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.filter(Condition::compare(column, CompareOp::Lte, value))
    }

    /// `column>value`.
    #[must_use]
    pub fn gt(self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.filter(Condition::compare(column, CompareOp::Gt, value))
    }

    /// `column>=value`.
    #[must_use]
    pub fn gte(self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.filter(Condition::compare(column, CompareOp::Gte, value))
    }

    /// `left=right` between two columns.
    #[must_use]
    pub fn eq_col(self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.filter(Condition::CompareColumns {
            left: left.into(),
            op: CompareOp::Eq,
            right: right.into(),
        })
    }

    /// `left<>right` between two columns.
    #[must_use]
    pub fn ne_col(self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.filter(Condition::CompareColumns {
            left: left.into(),
            op: CompareOp::Ne,
            right: right.into(),
        })
    }

    /// `column LIKE pattern`.
    #[must_use]
    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(Condition::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: false,
        })
    }

    /// `column NOT LIKE pattern`.
    #[must_use]
    pub fn not_like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(Condition::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: true,
        })
    }

    /// `column IN (values)`.
    #[must_use]
    pub fn is_in<V: ToValue>(self, column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(Condition::is_in(column, values))
    }

    /// `column NOT IN (values)`.
    #[must_use]
    pub fn not_in<V: ToValue>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(Condition::In {
            column: column.into(),
            values: values.into_iter().map(|v| v.to_value()).collect::<Vec<Value>>(),
            negated: true,
        })
    }

    /// Appends `column ASC` to the ordering.
    #[must_use]
    pub fn order_by_asc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), OrderDirection::Asc));
        self
    }

    /// Appends `column DESC` to the ordering.
    #[must_use]
    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), OrderDirection::Desc));
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub const fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// Skips leading rows.
    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Renders the statement.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedType` when a value cannot be quoted.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        let mut sql = String::from("SELECT ");
        if self.projection.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.projection.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        if let Some(alias) = &self.alias {
            sql.push(' ');
            sql.push_str(alias);
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.keyword());
            sql.push(' ');
            sql.push_str(&join.table);
            if !join.on.is_empty() {
                let on: Vec<String> = join
                    .on
                    .iter()
                    .map(|(left, right)| format!("{left}={right}"))
                    .collect();
                sql.push_str(" ON ");
                sql.push_str(&on.join(" AND "));
            }
        }

        if !self.conditions.is_empty() {
            let conditions = self
                .conditions
                .iter()
                .map(|c| c.to_sql(dialect))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| match direction {
                    OrderDirection::Asc => format!("{column} ASC"),
                    OrderDirection::Desc => format!("{column} DESC"),
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(limit) = dialect.limit_clause(self.take, self.skip) {
            sql.push(' ');
            sql.push_str(&limit);
        }

        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, PostgreSql, Sqlite3};

    #[test]
    fn test_select_all() {
        assert_eq!(Query::table("users").to_sql(&Sqlite3).unwrap(), "SELECT * FROM users");
    }

    #[test]
    fn test_where_conditions() {
        let cases = [
            (Query::table("users").eq("id", 1), "SELECT * FROM users WHERE id=1"),
            (
                Query::table("users").eq("name", "oliver"),
                "SELECT * FROM users WHERE name='oliver'",
            ),
            (
                Query::table("users").eq("expired", Value::Null),
                "SELECT * FROM users WHERE expired IS NULL",
            ),
            (
                Query::table("users").eq_col("expired", "expired2"),
                "SELECT * FROM users WHERE expired=expired2",
            ),
            (Query::table("users").ne("id", 1), "SELECT * FROM users WHERE id<>1"),
            (
                Query::table("users").ne("expired", Value::Null),
                "SELECT * FROM users WHERE expired IS NOT NULL",
            ),
            (
                Query::table("users").ne_col("expired", "expired2"),
                "SELECT * FROM users WHERE expired<>expired2",
            ),
            (
                Query::table("users").is_in("id", [1, 2, 3, 4]),
                "SELECT * FROM users WHERE id IN (1,2,3,4)",
            ),
            (
                Query::table("users").not_in("id", [1, 2, 3, 4]),
                "SELECT * FROM users WHERE id NOT IN (1,2,3,4)",
            ),
            (Query::table("users").lt("id", 1), "SELECT * FROM users WHERE id<1"),
            (Query::table("users").lte("id", 1), "SELECT * FROM users WHERE id<=1"),
            (Query::table("users").gt("id", 1), "SELECT * FROM users WHERE id>1"),
            (Query::table("users").gte("id", 1), "SELECT * FROM users WHERE id>=1"),
            (
                Query::table("users").like("name", "Oli%"),
                "SELECT * FROM users WHERE name LIKE 'Oli%'",
            ),
            (
                Query::table("users").not_like("name", "Oli%"),
                "SELECT * FROM users WHERE name NOT LIKE 'Oli%'",
            ),
        ];
        for (query, expected) in cases {
            assert_eq!(query.to_sql(&Sqlite3).unwrap(), expected);
        }
    }

    #[test]
    fn test_conditions_are_and_joined() {
        let sql = Query::table("users")
            .eq("id", 1)
            .eq("name", "Oliver")
            .to_sql(&MySql)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id=1 AND name='Oliver'");
    }

    #[test]
    fn test_projection_and_subquery() {
        let sub = Query::table("tweets")
            .project(["count(tweets.id)"])
            .eq_col("tweets.user_id", "users.user_id")
            .eq("tweets.retweets", 25)
            .to_sql(&MySql)
            .unwrap();
        let sql = Query::table("users")
            .project(["users.*"])
            .project_subquery(&sub, "num_tweets")
            .to_sql(&MySql)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT users.*, (SELECT count(tweets.id) FROM tweets WHERE tweets.user_id=users.user_id AND tweets.retweets=25) num_tweets FROM users"
        );
    }

    #[test]
    fn test_joins() {
        let sql = Query::table("users")
            .alias("u")
            .project(["u.name", "t.message"])
            .join("tweets t", "t.user_id", "u.id")
            .left_join("orders o", "o.user_id", "u.id")
            .on("o.ref_id", "t.ref_id")
            .cross_join("dual")
            .to_sql(&Sqlite3)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT u.name, t.message FROM users u INNER JOIN tweets t ON t.user_id=u.id LEFT JOIN orders o ON o.user_id=u.id AND o.ref_id=t.ref_id CROSS JOIN dual"
        );
    }

    #[test]
    fn test_right_and_full_joins() {
        let sql = Query::table("users")
            .alias("u")
            .right_join("tweets t", "t.user_id", "u.id")
            .to_sql(&Sqlite3)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users u RIGHT JOIN tweets t ON t.user_id=u.id");

        let sql = Query::table("users")
            .alias("u")
            .full_join("orders o", "o.user_id", "u.id")
            .on("o.active", "u.active")
            .to_sql(&PostgreSql)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users u FULL OUTER JOIN orders o ON o.user_id=u.id AND o.active=u.active"
        );
    }

    #[test]
    fn test_empty_in_lists() {
        let none: [i64; 0] = [];
        let sql = Query::table("users")
            .is_in("id", none)
            .not_in("name", Vec::<String>::new())
            .to_sql(&Sqlite3)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE 1=0 AND 1=1");
    }

    #[test]
    fn test_order_and_limits() {
        let query = Query::table("users")
            .order_by_asc("name")
            .order_by_desc("id")
            .skip(20)
            .take(10);
        assert_eq!(
            query.to_sql(&Sqlite3).unwrap(),
            "SELECT * FROM users ORDER BY name ASC, id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            query.to_sql(&MySql).unwrap(),
            "SELECT * FROM users ORDER BY name ASC, id DESC LIMIT 20,10"
        );
        assert_eq!(
            Query::table("users").skip(20).to_sql(&PostgreSql).unwrap(),
            "SELECT * FROM users OFFSET 20"
        );
    }
}
