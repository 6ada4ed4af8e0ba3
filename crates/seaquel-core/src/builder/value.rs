//! SQL values and parameter handling.
//!
//! Every value that reaches a statement is bound as a positional parameter;
//! nothing supplied by the caller is spliced into the SQL text.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A SQL value that can be bound as a parameter or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the timestamp payload, if any.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl ToSqlValue for i32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self)
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self.naive_utc())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

/// A value assigned to a column by `insert` or `update`.
///
/// Besides plain values this carries the `increment` pseudo-value, which
/// renders as `col = col + $n` so concurrent writers never race on a
/// read-modify-write cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A literal value bound as-is.
    Sql(SqlValue),
    /// Relative change applied to the column's current value.
    Increment(i64),
}

impl<T: ToSqlValue> From<T> for Value {
    fn from(value: T) -> Self {
        Self::Sql(value.to_sql_value())
    }
}

/// Builds an increment pseudo-value for `update`.
///
/// Negative amounts subtract.
#[must_use]
pub const fn incr(amount: i64) -> Value {
    Value::Increment(amount)
}

/// An ordered set of column assignments.
///
/// A key that was never set is *absent* and is left out of the generated
/// statement entirely; a key set to [`SqlValue::Null`] is present and bound
/// as NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(String, Value)>,
}

impl Values {
    /// Creates an empty set of assignments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value, builder style.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column value in place, keeping the original position when the
    /// key already exists. Returns the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == column) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((column, value));
        None
    }

    /// Removes a column, making it absent again.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(key, _)| key == column)?;
        Some(self.entries.remove(position).1)
    }

    /// Returns the value for a column, if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == column)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the column is present (even when NULL).
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Iterates over present columns in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of present columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no column is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered set of WHERE conditions, combined with AND.
///
/// Keys are either a bare column name (equality) or `"<column> <operator>"`,
/// e.g. `"id >"` or `"deleted_at IS NOT"`. The operator is emitted verbatim,
/// so filter keys must come from trusted code, never from end users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: Vec<(String, SqlValue)>,
}

impl Filter {
    /// Creates an empty filter (matches every row).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn and<T: ToSqlValue>(mut self, key: impl Into<String>, value: T) -> Self {
        self.entries.push((key.into(), value.to_sql_value()));
        self
    }

    /// Iterates over conditions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of conditions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
