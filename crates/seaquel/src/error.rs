//! Error types for database access.

use seaquel_core::{BuildError, SqlValue};
use thiserror::Error;

use crate::diff::DiffError;

/// Errors returned by [`Database`](crate::Database) and table handles.
#[derive(Debug, Error)]
pub enum Error {
    /// A statement failed. Carries the SQL and its parameters.
    #[error("{source}. SQL: {sql} params: {}", params_json(.params))]
    Query {
        /// SQL text as sent.
        sql: String,
        /// Bound parameters in placeholder order.
        params: Vec<SqlValue>,
        /// Driver error.
        source: sqlx::Error,
    },

    /// A result column could not be converted into a value.
    #[error(
        "Failed to decode column {index}: {message}. SQL: {sql} params: {}",
        params_json(.params)
    )]
    Decode {
        /// SQL text as sent.
        sql: String,
        /// Bound parameters in placeholder order.
        params: Vec<SqlValue>,
        /// Column position.
        index: String,
        /// Decoder message.
        message: String,
    },

    /// No connection could be taken from the pool.
    #[error("Failed to acquire a connection: {0}")]
    Acquire(#[source] sqlx::Error),

    /// The statement could not be built from the arguments.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// `transaction` was called while one is already open for the same
    /// database on the current task.
    #[error("A transaction is already open for this database on the current task")]
    NestedTransaction,

    /// ROLLBACK itself failed after the work failed.
    #[error("Rollback failed: {source} (rolling back after: {original})")]
    Rollback {
        /// The rollback failure.
        source: Box<Error>,
        /// Message of the failure that triggered the rollback.
        original: String,
    },

    /// Invalid connection options.
    #[error("Invalid connection options: {0}")]
    Config(String),

    /// The schema-diff collaborator failed.
    #[error("Schema diff failed: {0}")]
    Diff(#[source] DiffError),

    /// The live database differs from the declared schema.
    #[error("{} pending migration statement(s) must be applied first", .0.len())]
    PendingMigrations(Vec<String>),

    /// A statement expected to return a row returned none.
    #[error("No row returned. SQL: {0}")]
    NoRowReturned(String),
}

impl Error {
    /// Wraps a driver error with the statement that caused it.
    pub(crate) fn query(sql: &str, params: &[SqlValue], source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::ColumnDecode { index, source } => Self::Decode {
                sql: String::from(sql),
                params: params.to_vec(),
                index,
                message: source.to_string(),
            },
            source => Self::Query {
                sql: String::from(sql),
                params: params.to_vec(),
                source,
            },
        }
    }
}

fn params_json(params: &[SqlValue]) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"))
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_sql_and_params() {
        let err = Error::query(
            "SELECT * FROM users WHERE id = $1 AND email = $2",
            &[SqlValue::Int(1), SqlValue::Null],
            sqlx::Error::Protocol(String::from("boom")),
        );
        let message = err.to_string();
        assert!(message.contains("boom. SQL: SELECT * FROM users WHERE id = $1 AND email = $2"));
        assert!(message.ends_with("params: [1,null]"));
    }

    #[test]
    fn test_decode_errors_are_separated() {
        let err = Error::query(
            "SELECT amount FROM payments WHERE id = $1",
            &[SqlValue::Int(9)],
            sqlx::Error::ColumnDecode {
                index: String::from("0"),
                source: "not a number".into(),
            },
        );
        assert!(matches!(
            err,
            Error::Decode { ref index, ref params, .. } if index == "0" && params == &[SqlValue::Int(9)]
        ));
        assert_eq!(
            err.to_string(),
            "Failed to decode column 0: not a number. SQL: SELECT amount FROM payments WHERE id = $1 params: [9]"
        );
    }

    #[test]
    fn test_rollback_error_mentions_original() {
        let err = Error::Rollback {
            source: Box::new(Error::Config(String::from("gone"))),
            original: String::from("constraint violated"),
        };
        assert_eq!(
            err.to_string(),
            "Rollback failed: Invalid connection options: gone (rolling back after: constraint violated)"
        );
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: Error = BuildError::UnknownTable(String::from("x")).into();
        assert_eq!(err.to_string(), "unknown table: x");
    }
}
