//! Ambient transactions.
//!
//! A transaction pins one connection to the task running the work. The
//! binding lives in a tokio task-local scope, keyed by database, so every
//! statement the work issues through that database (however deeply nested)
//! lands on the pinned connection, while other tasks keep borrowing from
//! the pool.
//!
//! The scope only covers the task polling the work: futures handed to
//! `tokio::spawn` run outside it and autocommit.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::Connection;
use crate::error::{Error, Result};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "READ UNCOMMITTED" => Ok(Self::ReadUncommitted),
            "READ COMMITTED" => Ok(Self::ReadCommitted),
            "REPEATABLE READ" => Ok(Self::RepeatableRead),
            "SERIALIZABLE" => Ok(Self::Serializable),
            _ => Err(Error::Config(format!("unknown isolation level: {s}"))),
        }
    }
}

/// The statement opening a transaction.
#[must_use]
pub fn begin_sql(isolation: Option<IsolationLevel>) -> String {
    match isolation {
        Some(level) => format!("BEGIN ISOLATION LEVEL {}", level.as_sql()),
        None => String::from("BEGIN"),
    }
}

/// Lifecycle of a [`TransactionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Began,
    Committed,
    RolledBack,
}

pub(crate) type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

/// A pinned connection, visible to the work of one transaction.
#[derive(Clone)]
pub(crate) struct Binding {
    database: u64,
    connection: SharedConnection,
}

tokio::task_local! {
    static AMBIENT: Vec<Binding>;
}

/// The connection pinned for `database` on the current task, if any.
pub(crate) fn current(database: u64) -> Option<SharedConnection> {
    AMBIENT
        .try_with(|bindings| {
            bindings
                .iter()
                .find(|b| b.database == database)
                .map(|b| Arc::clone(&b.connection))
        })
        .ok()
        .flatten()
}

/// Runs `work` with `connection` pinned for `database`, on top of whatever
/// other databases already have pinned on this task.
pub(crate) async fn scope<F>(database: u64, connection: SharedConnection, work: F) -> F::Output
where
    F: std::future::Future,
{
    let mut bindings = AMBIENT.try_with(Clone::clone).unwrap_or_default();
    bindings.push(Binding {
        database,
        connection,
    });
    AMBIENT.scope(bindings, work).await
}

/// One open transaction: its connection and where it is in its lifecycle.
///
/// Ends exactly once, by [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropped while still open (the owning
/// future was cancelled), it rolls back in the background before the
/// connection goes back to the pool.
pub struct TransactionContext {
    database: u64,
    connection: SharedConnection,
    state: TransactionState,
}

impl TransactionContext {
    /// Opens a transaction on `connection`.
    pub(crate) async fn begin(
        database: u64,
        mut connection: Box<dyn Connection>,
        isolation: Option<IsolationLevel>,
    ) -> Result<Self> {
        let sql = begin_sql(isolation);
        info!(database, sql = %sql, "Beginning transaction");
        connection
            .execute(&sql, &[])
            .await
            .map_err(|source| Error::query(&sql, &[], source))?;
        Ok(Self {
            database,
            connection: Arc::new(Mutex::new(connection)),
            state: TransactionState::Began,
        })
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn connection(&self) -> SharedConnection {
        Arc::clone(&self.connection)
    }

    /// Commits and releases the connection.
    pub(crate) async fn commit(mut self) -> Result<()> {
        info!(database = self.database, "Committing transaction");
        self.finish("COMMIT", TransactionState::Committed).await
    }

    /// Rolls back and releases the connection.
    pub(crate) async fn rollback(mut self) -> Result<()> {
        warn!(database = self.database, "Rolling back transaction");
        self.finish("ROLLBACK", TransactionState::RolledBack).await
    }

    async fn finish(&mut self, sql: &str, state: TransactionState) -> Result<()> {
        let result = self.connection.lock().await.execute(sql, &[]).await;
        self.state = match (&result, state) {
            (Err(_), _) => TransactionState::RolledBack,
            (Ok(_), state) => state,
        };
        result
            .map(|_| ())
            .map_err(|source| Error::query(sql, &[], source))
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        if self.state != TransactionState::Began {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        warn!(database = self.database, "Transaction dropped while open, rolling back");
        let connection = Arc::clone(&self.connection);
        runtime.spawn(async move {
            if let Err(err) = connection.lock().await.execute("ROLLBACK", &[]).await {
                warn!(error = %err, "Background rollback failed");
            }
        });
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("database", &self.database)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_sql() {
        assert_eq!(begin_sql(None), "BEGIN");
        assert_eq!(
            begin_sql(Some(IsolationLevel::Serializable)),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
        assert_eq!(
            begin_sql(Some(IsolationLevel::ReadCommitted)),
            "BEGIN ISOLATION LEVEL READ COMMITTED"
        );
    }

    #[test]
    fn test_isolation_level_parse() {
        assert_eq!(
            "repeatable read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "READ_UNCOMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadUncommitted
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }

    #[tokio::test]
    async fn test_no_binding_outside_scope() {
        assert!(current(1).is_none());
    }
}
