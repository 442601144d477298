//! Column kinds supported by Quarry.
//!
//! A column's kind is resolved once from data-source metadata and then drives
//! type checks on staged writes and literal parsing in generated query text.

use crate::error::{Error, Result};
use crate::value::{Value, DATE_FORMAT, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use core::fmt;

/// The closed set of column kinds a cursor can describe.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKind {
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    LongInteger,
    /// UTF-8 text
    Text,
    /// Date and time without zone
    Timestamp,
    /// Calendar date
    Date,
    /// Integer key referencing the primary key of another table
    ForeignKey { table: String },
}

impl ColumnKind {
    /// Returns a short name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::LongInteger => "long integer",
            ColumnKind::Text => "text",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Date => "date",
            ColumnKind::ForeignKey { .. } => "foreign key",
        }
    }

    /// Returns whether a value may be stored in a column of this kind.
    ///
    /// Null is accepted by every kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnKind::Integer, Value::Int32(_)) => true,
            (ColumnKind::LongInteger, Value::Int64(_)) => true,
            (ColumnKind::Text, Value::String(_)) => true,
            (ColumnKind::Timestamp, Value::Timestamp(_)) => true,
            (ColumnKind::Date, Value::Date(_)) => true,
            (ColumnKind::ForeignKey { .. }, Value::Int32(_) | Value::Int64(_)) => true,
            _ => false,
        }
    }

    /// Returns whether this kind holds integers that a data source may
    /// generate on insert.
    #[inline]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            ColumnKind::Integer | ColumnKind::LongInteger | ColumnKind::ForeignKey { .. }
        )
    }

    /// Converts a value into this kind, widening or narrowing integers where
    /// the value fits.
    pub fn coerce(&self, column: &str, value: Value) -> Result<Value> {
        let coerced = match (self, value) {
            (ColumnKind::Integer, Value::Int64(v)) => match i32::try_from(v) {
                Ok(v) => Value::Int32(v),
                Err(_) => return Err(Error::type_mismatch(column, self.clone(), Value::Int64(v))),
            },
            (ColumnKind::LongInteger, Value::Int32(v)) => Value::Int64(v as i64),
            (_, value) => value,
        };
        if self.accepts(&coerced) {
            Ok(coerced)
        } else {
            Err(Error::type_mismatch(column, self.clone(), coerced))
        }
    }

    /// Parses an unquoted literal from query text into a value of this kind.
    pub fn parse_literal(&self, column: &str, literal: &str) -> Result<Value> {
        let mismatch = || Error::type_mismatch(column, self.clone(), Value::String(literal.into()));
        match self {
            ColumnKind::Integer => literal.trim().parse().map(Value::Int32).map_err(|_| mismatch()),
            ColumnKind::LongInteger => literal.trim().parse().map(Value::Int64).map_err(|_| mismatch()),
            ColumnKind::ForeignKey { .. } => {
                literal.trim().parse().map(Value::Int32).map_err(|_| mismatch())
            }
            ColumnKind::Text => Ok(Value::String(literal.to_string())),
            ColumnKind::Timestamp => NaiveDateTime::parse_from_str(literal, TIMESTAMP_FORMAT)
                .map(Value::Timestamp)
                .map_err(|_| mismatch()),
            ColumnKind::Date => NaiveDate::parse_from_str(literal, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| mismatch()),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::ForeignKey { table } => write!(f, "foreign key to {}", table),
            other => f.write_str(other.name()),
        }
    }
}
