//! Value type definitions for Quarry.
//!
//! This module defines the `Value` enum which represents any value that can be
//! read from or staged into a cell.

use crate::types::ColumnKind;
use chrono::{NaiveDate, NaiveDateTime};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// Text form of timestamps in query literals.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text form of dates in query literals.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A value that can be stored in a cell.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// UTF-8 string
    String(String),
    /// Date and time without zone
    Timestamp(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
}

impl Value {
    /// Returns the natural column kind of this value, or None if it's Null.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Value::Null => None,
            Value::Int32(_) => Some(ColumnKind::Integer),
            Value::Int64(_) => Some(ColumnKind::LongInteger),
            Value::String(_) => Some(ColumnKind::Text),
            Value::Timestamp(_) => Some(ColumnKind::Timestamp),
            Value::Date(_) => Some(ColumnKind::Date),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the i32 value if this is an Int32, None otherwise.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as i64 if this is any integer, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a Timestamp, None otherwise.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the date if this is a Date, None otherwise.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    /// Renders this value as a quoted literal for generated query text.
    ///
    /// Single quotes inside text are doubled. Null renders as the bare
    /// keyword `NULL`.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            other => format!("'{}'", other.to_string().replace('\'', "''")),
        }
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int32(_) => 1,
            Value::Int64(_) => 2,
            Value::String(_) => 3,
            Value::Timestamp(_) => 4,
            Value::Date(_) => 5,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::String(s) => s.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            // Cross-width integer comparisons
            (Value::Int32(a), Value::Int64(b)) => (*a as i64).cmp(b),
            (Value::Int64(a), Value::Int32(b)) => a.cmp(&(*b as i64)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Int32(42).kind(), Some(ColumnKind::Integer));
        assert_eq!(Value::Null.kind(), None);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int32(42).as_i32(), Some(42));
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Int64(100).as_i64(), Some(100));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        let t = ts("2026-01-05 08:00:00");
        assert_eq!(Value::Timestamp(t).as_timestamp(), Some(t));
        assert_eq!(Value::Timestamp(t).as_date(), None);
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int32(42), Value::Int32(42));
        assert_ne!(Value::Int32(42), Value::Int64(42));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::String(String::new()));
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::Int32(1) < Value::Int32(2));
        assert!(Value::Int32(1) < Value::Int64(2));
        assert!(Value::String("a".into()) < Value::String("b".into()));
        assert!(Value::Null < Value::Int32(0));
        assert!(Value::Timestamp(ts("2026-01-05 08:00:00")) < Value::Timestamp(ts("2026-01-05 09:00:00")));
    }

    #[test]
    fn test_to_literal() {
        assert_eq!(Value::Int32(4).to_literal(), "'4'");
        assert_eq!(Value::String("O'Hara".into()).to_literal(), "'O''Hara'");
        assert_eq!(Value::Null.to_literal(), "NULL");
        assert_eq!(
            Value::Timestamp(ts("2026-01-05 08:00:00")).to_literal(),
            "'2026-01-05 08:00:00'"
        );
    }

    #[test]
    fn test_value_from_impls() {
        let v: Value = 42i32.into();
        assert_eq!(v.as_i32(), Some(42));

        let v: Value = "hello".into();
        assert_eq!(v.as_str(), Some("hello"));

        let v: Value = None::<i32>.into();
        assert!(v.is_null());
    }
}
