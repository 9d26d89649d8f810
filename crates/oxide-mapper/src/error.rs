//! Error types for the mapper.

use std::time::Duration;

use thiserror::Error;

use crate::value::ValueError;

/// Mapper errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A type could not be described: malformed tag or conflicting markers.
    #[error("cannot map {type_name}.{field}: {message}")]
    Mapping {
        /// Rust type being described.
        type_name: &'static str,
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A write or lookup needs a table name the type never declared.
    #[error("type {0} has no table name (add `table=<name>` to a column tag)")]
    NoTableName(&'static str),

    /// An operation needs a primary key the type never declared.
    #[error("type {0} has no primary key field")]
    NoPrimaryKey(&'static str),

    /// A single-row or scalar fetch matched nothing.
    #[error("no rows in result set")]
    NoRows,

    /// A scalar fetch produced a value of another shape than requested.
    #[error("wrong type: {0}")]
    WrongType(#[source] ValueError),

    /// Quoting was asked to render a value kind it does not support.
    #[error("unsupported value type for quoting: {0}")]
    UnsupportedType(&'static str),

    /// An association field is not a `Vec` (one-to-many) or `Option` (one-to-one).
    #[error("association {type_name}.{field} must be a Vec or Option of a mapped type")]
    AssociationShape {
        /// Owner of the association.
        type_name: &'static str,
        /// Association field.
        field: String,
    },

    /// A fetched column could not be stored into its field.
    #[error("cannot store column `{column}` into {type_name}: {source}")]
    Conversion {
        /// Destination type.
        type_name: &'static str,
        /// Column being scanned.
        column: String,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },

    /// A database call did not finish before the configured deadline.
    #[error("database call did not finish within {0:?}")]
    Timeout(Duration),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl OrmError {
    pub(crate) fn mapping(
        type_name: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Mapping {
            type_name,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for the distinguished "not found" condition.
    #[must_use]
    pub const fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }
}

/// Result type alias for mapper operations.
pub type Result<T> = std::result::Result<T, OrmError>;
