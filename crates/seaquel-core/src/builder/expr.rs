//! WHERE conditions and the shared parameter list.
//!
//! Every fragment of one statement is rendered against the same [`Params`],
//! so placeholder numbers always match parameter positions no matter how
//! SET, JOIN and WHERE fragments are combined.

use crate::dialect::Dialect;

use super::value::{Filter, SqlValue};

/// The growing list of bound parameters of one statement.
pub struct Params<'d> {
    dialect: &'d dyn Dialect,
    values: Vec<SqlValue>,
}

impl<'d> Params<'d> {
    /// Creates an empty parameter list.
    #[must_use]
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// The dialect placeholders and identifiers are rendered with.
    #[must_use]
    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    /// Appends a value and returns its placeholder.
    pub fn bind(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    /// Number of values bound so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the list, returning the values in placeholder order.
    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Splits a filter key into its column and optional operator.
///
/// `"id"` has no operator; `"id >"` and `"deleted_at IS NOT"` split on the
/// first space.
#[must_use]
pub fn split_key(key: &str) -> (&str, Option<&str>) {
    let key = key.trim();
    match key.split_once(' ') {
        Some((column, operator)) if !operator.trim().is_empty() => (column, Some(operator.trim())),
        Some((column, _)) => (column, None),
        None => (key, None),
    }
}

/// Quotes a column, qualified with `qualifier` when given.
#[must_use]
pub fn qualified(dialect: &dyn Dialect, qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(q) => format!(
            "{}.{}",
            dialect.quote_identifier(q),
            dialect.quote_identifier(column)
        ),
        None => dialect.quote_identifier(column),
    }
}

/// Renders one condition.
///
/// A bare key compares with `=` and always binds, NULL included. A key with
/// an operator binds its value, except NULL which is written literally so
/// `IS` / `IS NOT` work.
pub fn condition(
    params: &mut Params<'_>,
    qualifier: Option<&str>,
    key: &str,
    value: &SqlValue,
) -> String {
    let (column, operator) = split_key(key);
    let column = qualified(params.dialect(), qualifier, column);
    match operator {
        Some(operator) if value.is_null() => format!("{column} {operator} NULL"),
        Some(operator) => format!("{column} {operator} {}", params.bind(value.clone())),
        None => format!("{column} = {}", params.bind(value.clone())),
    }
}

/// Renders every condition of a filter, in order.
pub fn conditions(params: &mut Params<'_>, qualifier: Option<&str>, filter: &Filter) -> Vec<String> {
    filter
        .iter()
        .map(|(key, value)| condition(params, qualifier, key, value))
        .collect()
}
