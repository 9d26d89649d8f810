//! Values crossing the boundary between entity fields and SQL text.
//!
//! Every mapped field converts into a [`Value`] before it is quoted into a
//! statement, and every fetched column arrives as a [`Value`] before it is
//! stored back into a field.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer too wide for `Int`.
    UInt(u64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Date-time without zone.
    DateTime(NaiveDateTime),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::Blob(_) => "blob",
        }
    }

    /// Returns `true` for `Value::Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Key equality used when matching foreign keys to primary keys.
    ///
    /// Integers compare by numeric value regardless of signedness, so an
    /// `i64` key matches a `u64` foreign key holding the same number.
    #[must_use]
    pub fn key_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::UInt(b)) | (Self::UInt(b), Self::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Self::Null, _) | (_, Self::Null) => false,
            _ => self == other,
        }
    }
}

/// A value could not be converted into the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    /// Rust type that was requested.
    pub expected: &'static str,
    /// Kind of value that was produced.
    pub found: &'static str,
}

impl ValueError {
    /// Creates an error for `value` not fitting `expected`.
    #[must_use]
    pub const fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            found: value.kind(),
        }
    }
}

/// Trait for field types that can be written into SQL.
pub trait ToValue {
    /// Converts the field to a `Value`.
    fn to_value(&self) -> Value;
}

/// Trait for field types that can be read back from a fetched column.
pub trait FromValue: Sized {
    /// Converts a fetched value, failing when the value has another shape.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

macro_rules! integer_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl ToValue for $ty {
            fn to_value(&self) -> Value {
                Value::$variant((*self).into())
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, ValueError> {
                match value {
                    Value::Int(n) => {
                        Self::try_from(n).map_err(|_| ValueError::new(stringify!($ty), &value))
                    }
                    Value::UInt(n) => {
                        Self::try_from(n).map_err(|_| ValueError::new(stringify!($ty), &value))
                    }
                    Value::Bool(b) => Ok(Self::from(b)),
                    other => Err(ValueError::new(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

integer_value! {
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    u64 => UInt,
}

impl ToValue for isize {
    #[allow(clippy::cast_possible_truncation)]
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for isize {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        i64::from_value(value.clone())
            .and_then(|n| Self::try_from(n).map_err(|_| ValueError::new("isize", &value)))
    }
}

impl ToValue for usize {
    #[allow(clippy::cast_possible_truncation)]
    fn to_value(&self) -> Value {
        Value::UInt(*self as u64)
    }
}

impl FromValue for usize {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        u64::from_value(value.clone())
            .and_then(|n| Self::try_from(n).map_err(|_| ValueError::new("usize", &value)))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(n) => Ok(n as Self),
            Value::UInt(n) => Ok(n as Self),
            other => Err(ValueError::new("f64", &other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(_) | Value::Int(_) | Value::UInt(_) => {
                f64::from_value(value).map(|f| f as Self)
            }
            other => Err(ValueError::new("f32", &other)),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(n) => Ok(n != 0),
            Value::UInt(n) => Ok(n != 0),
            other => Err(ValueError::new("bool", &other)),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ValueError::new("String", &other)),
        }
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::Text(ref text) => {
                parse_datetime(text).ok_or_else(|| ValueError::new("NaiveDateTime", &value))
            }
            other => Err(ValueError::new("NaiveDateTime", &other)),
        }
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::DateTime(self.naive_utc())
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        NaiveDateTime::from_value(value).map(|dt| dt.and_utc())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::new("Vec<u8>", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: FromValue> FromValue for Box<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        T::from_value(value).map(Self::new)
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_value_conversions() {
        assert_eq!(true.to_value(), Value::Bool(true));
        assert_eq!(42_i32.to_value(), Value::Int(42));
        assert_eq!(7_u32.to_value(), Value::Int(7));
        assert_eq!(u64::MAX.to_value(), Value::UInt(u64::MAX));
        assert_eq!(2.5_f64.to_value(), Value::Float(2.5));
        assert_eq!("hello".to_value(), Value::Text(String::from("hello")));
        assert_eq!(None::<i32>.to_value(), Value::Null);
        assert_eq!(Some(42_i32).to_value(), Value::Int(42));
    }

    #[test]
    fn test_integer_narrowing_is_checked() {
        assert_eq!(i8::from_value(Value::Int(12)), Ok(12));
        assert_eq!(
            i8::from_value(Value::Int(300)),
            Err(ValueError {
                expected: "i8",
                found: "integer"
            })
        );
        assert!(u32::from_value(Value::Int(-1)).is_err());
    }

    #[test]
    fn test_float_accepts_integers_but_integers_reject_floats() {
        assert_eq!(f64::from_value(Value::Int(3)), Ok(3.0));
        assert!(i64::from_value(Value::Float(1.5)).is_err());
        assert!(i64::from_value(Value::Text(String::from("1"))).is_err());
    }

    #[test]
    fn test_bool_from_integer() {
        assert_eq!(bool::from_value(Value::Int(0)), Ok(false));
        assert_eq!(bool::from_value(Value::Int(1)), Ok(true));
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<f64>::from_value(Value::Null), Ok(None));
        assert_eq!(Option::<f64>::from_value(Value::Float(42.13)), Ok(Some(42.13)));
        assert!(i64::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_datetime_from_text() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 30))
            .unwrap();
        for text in [
            "2024-03-09 14:05:30",
            "2024-03-09T14:05:30",
            "2024-03-09 14:05:30.000",
        ] {
            assert_eq!(
                NaiveDateTime::from_value(Value::Text(text.to_string())),
                Ok(expected)
            );
        }
        assert!(NaiveDateTime::from_value(Value::Text(String::from("yesterday"))).is_err());
    }

    #[test]
    fn test_key_eq_across_signedness() {
        assert!(Value::Int(5).key_eq(&Value::UInt(5)));
        assert!(!Value::Int(-5).key_eq(&Value::UInt(5)));
        assert!(!Value::Null.key_eq(&Value::Null));
        assert!(Value::Text(String::from("a")).key_eq(&Value::Text(String::from("a"))));
    }
}
