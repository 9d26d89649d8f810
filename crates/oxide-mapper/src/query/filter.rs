//! WHERE conditions.

use std::fmt;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::quote::{quote, quote_list};
use crate::value::{ToValue, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
        }
    }
}

/// A single condition; a query joins its conditions with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column op value`. `=`/`<>` against `NULL` render `IS [NOT] NULL`.
    Compare {
        /// Column expression.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand value.
        value: Value,
    },
    /// `left op right` between two column expressions.
    CompareColumns {
        /// Left column expression.
        left: String,
        /// Operator.
        op: CompareOp,
        /// Right column expression.
        right: String,
    },
    /// `column [NOT] LIKE pattern`.
    Like {
        /// Column expression.
        column: String,
        /// Pattern, quoted as a string literal.
        pattern: String,
        /// `NOT LIKE` when set.
        negated: bool,
    },
    /// `column [NOT] IN (values)`.
    In {
        /// Column expression.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
        /// `NOT IN` when set.
        negated: bool,
    },
}

impl Condition {
    /// Creates `column op value`.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl ToValue) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.to_value(),
        }
    }

    /// Creates `column IN (values)`.
    pub fn is_in<V: ToValue>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(|v| v.to_value()).collect(),
            negated: false,
        }
    }

    /// Renders the condition.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedType` when a value cannot be quoted.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        Ok(match self {
            Self::Compare {
                column,
                op: CompareOp::Eq,
                value: Value::Null,
            } => format!("{column} IS NULL"),
            Self::Compare {
                column,
                op: CompareOp::Ne,
                value: Value::Null,
            } => format!("{column} IS NOT NULL"),
            Self::Compare { column, op, value } => {
                format!("{column}{op}{}", quote(dialect, value)?)
            }
            Self::CompareColumns { left, op, right } => format!("{left}{op}{right}"),
            Self::Like {
                column,
                pattern,
                negated,
            } => format!(
                "{column} {}LIKE {}",
                if *negated { "NOT " } else { "" },
                quote(dialect, &Value::Text(pattern.clone()))?
            ),
            // Nothing is in an empty list.
            Self::In { values, negated, .. } if values.is_empty() => {
                String::from(if *negated { "1=1" } else { "1=0" })
            }
            Self::In {
                column,
                values,
                negated,
            } => format!(
                "{column} {}IN ({})",
                if *negated { "NOT " } else { "" },
                quote_list(dialect, values)?
            ),
        })
    }
}
