//! # seaquel
//!
//! Declarative Postgres data access: declare tables once with
//! [`seaquel_core`], then insert, update, query and join through
//! per-table handles, with transactions that follow the calling task.
//!
//! ## Transactions without passing a handle
//!
//! ```rust,no_run
//! use seaquel::{Database, Error, Values};
//! use seaquel::schema::{integer, serial, text, Schema};
//!
//! # async fn example() -> Result<(), Error> {
//! let mut schema = Schema::new();
//! schema
//!     .add_table("accounts")
//!     .add_column(serial("id").primary_key())
//!     .add_column(text("owner"))
//!     .add_column(integer("balance").default(0));
//!
//! let db = Database::from_url("postgres://app@localhost/bank", schema)?;
//! let accounts = db.table("accounts")?;
//!
//! db.transaction(None, || async move {
//!     // Both statements run on the transaction's connection.
//!     let row = accounts.insert(&Values::new().set("owner", "leia")).await?;
//!     let id = row.get_i64("id").unwrap_or_default();
//!     accounts
//!         .update(&Values::new().set("id", id).set("balance", 10))
//!         .await?;
//!     Ok::<_, Error>(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod database;
pub mod diff;
pub mod error;
pub mod manager;
pub mod transaction;

pub use seaquel_core::{builder, row, schema};
pub use seaquel_core::{
    incr, BuildError, Filter, Join, JoinKind, JoinedRow, Row, SelectOptions, SqlValue, Statement,
    ToSqlValue, Value, Values,
};

pub use client::{BoxFuture, Connection, ConnectionSource};
pub use config::{ConnectOptions, OptionValue};
pub use database::Database;
pub use diff::{DiffError, MigrationMode, SchemaDiffer};
pub use error::{Error, Result};
pub use manager::Manager;
pub use transaction::{IsolationLevel, TransactionContext, TransactionState};
