//! Result rows.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::builder::value::SqlValue;

/// One result row: column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    columns: BTreeMap<String, SqlValue>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) -> Option<SqlValue> {
        self.columns.insert(column.into(), value)
    }

    /// Returns a column's value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    /// Returns a column as an integer.
    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Returns a column as a boolean.
    #[must_use]
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(SqlValue::as_bool)
    }

    /// Returns a column as text.
    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Returns a column as a timestamp.
    #[must_use]
    pub fn get_timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        self.get(column).and_then(SqlValue::as_timestamp)
    }

    /// Removes a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        self.columns.remove(column)
    }

    /// Iterates over columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Column names in name order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, SqlValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
