//! Errors raised while turning a table and a value object into SQL.

use thiserror::Error;

/// Statement-building errors. These are caller-input errors: retrying the
/// same call can never succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The table is not registered in the schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The table has no primary key, so it cannot be addressed by one.
    #[error("table '{0}' has no primary key")]
    NoPrimaryKey(String),

    /// A primary-key column was absent from the object passed to
    /// `update`/`delete`.
    #[error("missing value for primary key column '{column}' of table '{table}'")]
    MissingPrimaryKey {
        /// Table name.
        table: String,
        /// The absent primary-key column.
        column: String,
    },

    /// `update` was called with nothing to set.
    #[error("nothing to update in table '{0}'")]
    EmptySet(String),

    /// An increment pseudo-value was used where only literal values make
    /// sense (INSERT values, primary keys).
    #[error("increment is not allowed for column '{0}' here")]
    IncrementNotAllowed(String),

    /// No foreign key links the base table to the joined table.
    #[error("no foreign key from '{table}' to '{referenced}'{}", through_suffix(.through))]
    NoForeignKey {
        /// Base table.
        table: String,
        /// Joined table.
        referenced: String,
        /// Requested join columns, if any.
        through: Option<Vec<String>>,
    },

    /// More than one foreign key could satisfy the join.
    #[error("ambiguous join from '{table}' to '{referenced}': candidates {}", .candidates.join(", "))]
    AmbiguousJoin {
        /// Base table.
        table: String,
        /// Joined table.
        referenced: String,
        /// Names of the matching constraints.
        candidates: Vec<String>,
    },

    /// A join alias repeats the base table name or another join's alias,
    /// so two parts of a joined row would share one name.
    #[error("join alias '{0}' is already used in this query")]
    DuplicateJoinAlias(String),

    /// A result label would exceed the server's identifier limit and come
    /// back truncated.
    #[error("result label '{label}' is longer than {max} bytes")]
    LabelTooLong {
        /// The generated `<qualifier>_<column>` label.
        label: String,
        /// Longest label the server keeps intact.
        max: usize,
    },

    /// A joined result row lacks a label the select list asked for.
    #[error("result row has no column '{0}'")]
    MissingResultColumn(String),

    /// The increment cannot be bound as a positive amount.
    #[error("increment for column '{0}' is out of range")]
    IncrementOutOfRange(String),
}

fn through_suffix(through: &Option<Vec<String>>) -> String {
    through
        .as_ref()
        .map(|cols| format!(" through ({})", cols.join(", ")))
        .unwrap_or_default()
}

/// Result type alias for statement building.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BuildError::MissingPrimaryKey {
            table: String::from("users"),
            column: String::from("id"),
        };
        assert_eq!(
            err.to_string(),
            "missing value for primary key column 'id' of table 'users'"
        );

        let err = BuildError::NoForeignKey {
            table: String::from("notifications"),
            referenced: String::from("users"),
            through: Some(vec![String::from("author_id")]),
        };
        assert_eq!(
            err.to_string(),
            "no foreign key from 'notifications' to 'users' through (author_id)"
        );

        let err = BuildError::AmbiguousJoin {
            table: String::from("messages"),
            referenced: String::from("users"),
            candidates: vec![String::from("a_fk"), String::from("b_fk")],
        };
        assert!(err.to_string().ends_with("candidates a_fk, b_fk"));

        let err = BuildError::LabelTooLong {
            label: String::from("x"),
            max: 63,
        };
        assert_eq!(err.to_string(), "result label 'x' is longer than 63 bytes");
    }
}
