//! # seaquel-core
//!
//! Declarative table definitions and the parameterized SQL derived from
//! them.
//!
//! This crate provides:
//! - A schema registry: tables, columns, constraints, indexes and the
//!   sequences backing serial columns
//! - A statement builder producing `$n`-parameterized CRUD statements
//! - A join resolver that infers join conditions from registered foreign
//!   keys and splits joined rows back into per-table parts
//! - A serializable schema description for external diff tools
//!
//! It performs no I/O; the `seaquel` crate executes what is built here.
//!
//! ## Example
//!
//! ```rust
//! use seaquel_core::builder::{Filter, Join, SelectOptions, StatementBuilder};
//! use seaquel_core::schema::{serial, text, Schema};
//!
//! let mut schema = Schema::new();
//! schema
//!     .add_table("users")
//!     .add_column(serial("id").primary_key())
//!     .add_column(text("first_name"));
//! let user_id = schema.table("users").unwrap().column("id").unwrap().clone();
//! schema
//!     .add_table("notifications")
//!     .add_column(serial("id").primary_key())
//!     .add_column(text("text"))
//!     .add_foreign_key("user_id", &user_id);
//!
//! let notifications = StatementBuilder::for_table(&schema, "notifications").unwrap();
//! let (stmt, _projection) = notifications
//!     .select_joined(
//!         &Filter::new(),
//!         &SelectOptions::new(),
//!         &[Join::inner("users", "user")
//!             .filter(Filter::new().and("first_name", "Darth"))
//!             .filter_only()],
//!     )
//!     .unwrap();
//!
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT \"notifications\".\"id\" AS \"notifications_id\", \
//!      \"notifications\".\"text\" AS \"notifications_text\", \
//!      \"notifications\".\"user_id\" AS \"notifications_user_id\" \
//!      FROM \"public\".\"notifications\" \
//!      INNER JOIN \"public\".\"users\" \"_user\" \
//!      ON \"notifications\".\"user_id\" = \"_user\".\"id\" \
//!      AND \"_user\".\"first_name\" = $1"
//! );
//! ```

pub mod builder;
pub mod dialect;
pub mod error;
pub mod row;
pub mod schema;

pub use builder::{
    incr, Filter, Join, JoinKind, JoinedRow, Projection, SelectOptions, SqlValue, Statement,
    StatementBuilder, ToSqlValue, Value, Values,
};
pub use error::{BuildError, Result};
pub use row::Row;
pub use schema::{Column, ColumnKind, Schema, SchemaDescription, Table};
