//! The database handle: schema, connection source and routing.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use seaquel_core::{Row, Schema, SqlValue, Statement};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::client::{Connection, ConnectionSource};
use crate::config::ConnectOptions;
use crate::diff::{MigrationMode, SchemaDiffer};
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::transaction::{self, IsolationLevel, TransactionContext};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    schema: Schema,
    source: Box<dyn ConnectionSource>,
    options: ConnectOptions,
}

/// A declared schema bound to a connection source.
///
/// Cheap to clone; clones share the schema, the pool and the identity used
/// for routing statements to an open transaction.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

/// A connection for one statement: the transaction's, or a pooled one
/// released on drop.
enum Handle {
    Pinned(OwnedMutexGuard<Box<dyn Connection>>),
    Pooled(Box<dyn Connection>),
}

impl Deref for Handle {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Pinned(guard) => &***guard,
            Self::Pooled(connection) => &**connection,
        }
    }
}

impl DerefMut for Handle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Pinned(guard) => &mut ***guard,
            Self::Pooled(connection) => &mut **connection,
        }
    }
}

impl Database {
    /// Creates a lazily connecting Postgres pool for `schema`.
    ///
    /// Must be called within a tokio runtime. No connection is opened until
    /// the first statement runs.
    pub fn connect(options: ConnectOptions, schema: Schema) -> Result<Self> {
        let pool = options
            .pool_options()
            .connect_lazy_with(options.pg_connect_options()?);
        info!(
            host = %options.host,
            port = options.port,
            max_connections = options.max_connections,
            "Created connection pool"
        );
        Ok(Self::with_source(schema, pool, options))
    }

    /// Like [`connect`](Self::connect), from a `postgres://` URI.
    pub fn from_url(url: &str, schema: Schema) -> Result<Self> {
        Self::connect(url.parse()?, schema)
    }

    /// Uses any connection source.
    pub fn with_source(
        schema: Schema,
        source: impl ConnectionSource,
        options: ConnectOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                schema,
                source: Box::new(source),
                options,
            }),
        }
    }

    /// The declared schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Connection options.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    /// Handle for CRUD on one table.
    pub fn table(&self, name: &str) -> Result<Manager> {
        Manager::new(self.clone(), name)
    }

    /// Returns `true` if the current task is inside a transaction on this
    /// database.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        transaction::current(self.inner.id).is_some()
    }

    async fn connection(&self) -> Result<Handle> {
        match transaction::current(self.inner.id) {
            Some(pinned) => Ok(Handle::Pinned(pinned.lock_owned().await)),
            None => self
                .inner
                .source
                .acquire()
                .await
                .map(Handle::Pooled)
                .map_err(Error::Acquire),
        }
    }

    /// Runs a statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut connection = self.connection().await?;
        debug!(sql = %sql, params = params.len(), "Executing SQL");
        connection
            .execute(sql, params)
            .await
            .map_err(|source| Error::query(sql, params, source))
    }

    /// Runs a query, returning every row.
    pub async fn query_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut connection = self.connection().await?;
        debug!(sql = %sql, params = params.len(), "Fetching rows");
        connection
            .fetch(sql, params)
            .await
            .map_err(|source| Error::query(sql, params, source))
    }

    /// Runs a query, returning its first row.
    pub async fn query_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.query_all(sql, params).await?.into_iter().next())
    }

    pub(crate) async fn execute_statement(&self, statement: &Statement) -> Result<u64> {
        self.execute(&statement.sql, &statement.params).await
    }

    pub(crate) async fn fetch_statement(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.query_all(&statement.sql, &statement.params).await
    }

    /// Runs `work` inside a transaction.
    ///
    /// Every statement `work` issues through this database on the current
    /// task uses one connection between `BEGIN` and `COMMIT`. If `work`
    /// fails the transaction is rolled back and its error returned; if the
    /// rollback fails too, that failure is returned instead, carrying the
    /// original message.
    ///
    /// Transactions do not nest: calling this from inside `work` returns
    /// [`Error::NestedTransaction`].
    pub async fn transaction<F, Fut, T, E>(
        &self,
        isolation: Option<IsolationLevel>,
        work: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error> + fmt::Display,
    {
        if self.in_transaction() {
            return Err(Error::NestedTransaction.into());
        }
        let connection = self.inner.source.acquire().await.map_err(Error::Acquire)?;
        let context = TransactionContext::begin(self.inner.id, connection, isolation).await?;

        let outcome = transaction::scope(self.inner.id, context.connection(), async move {
            work().await
        })
        .await;

        match outcome {
            Ok(value) => {
                context.commit().await?;
                Ok(value)
            }
            Err(err) => match context.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => Err(Error::Rollback {
                    source: Box::new(rollback),
                    original: err.to_string(),
                }
                .into()),
            },
        }
    }

    /// Asks `differ` for the DDL that brings the live database in line with
    /// the declared schema. The statements are returned, never executed.
    pub async fn sync(&self, differ: &dyn SchemaDiffer, mode: MigrationMode) -> Result<Vec<String>> {
        let live = differ
            .describe_live_schema(&self.inner.options)
            .await
            .map_err(Error::Diff)?;
        let desired = self.inner.schema.describe();
        let statements = differ
            .compute_migration(&live, &desired, mode)
            .map_err(Error::Diff)?;
        info!(mode = %mode, statements = statements.len(), "Computed schema diff");
        Ok(statements)
    }

    /// Fails with [`Error::PendingMigrations`] unless the live database
    /// matches the declared schema.
    pub async fn ensure_synced(&self, differ: &dyn SchemaDiffer, mode: MigrationMode) -> Result<()> {
        let statements = self.sync(differ, mode).await?;
        if statements.is_empty() {
            Ok(())
        } else {
            Err(Error::PendingMigrations(statements))
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.inner.id)
            .field("tables", &self.inner.schema.table_names())
            .finish_non_exhaustive()
    }
}
