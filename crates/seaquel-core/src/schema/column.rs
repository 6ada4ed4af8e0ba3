//! Column kinds and the column definition builder.
//!
//! A [`ColumnBuilder`] accumulates everything known about a column and is
//! finalized exactly once by [`Table::add_column`](super::Table::add_column)
//! into an immutable [`Column`] plus the constraints, indexes and sequences
//! the modifiers asked for.

use std::fmt;
use std::sync::Arc;

use crate::builder::value::SqlValue;

use super::constraint::IndexMethod;

/// Value hook run right before SQL generation. Receives the caller-supplied
/// value (`None` when absent) and returns the value actually bound (`None`
/// leaves the column absent).
pub type Hook = Arc<dyn Fn(Option<SqlValue>) -> Option<SqlValue> + Send + Sync>;

/// The semantic kind of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// Bounded character string.
    Text,
    /// 64-bit integer.
    Number,
    /// Boolean.
    Boolean,
    /// Timestamp without time zone.
    DateTime,
    /// 32-bit integer backed by a `<table>_id_seq` sequence.
    Serial,
    /// Plain 32-bit integer.
    Integer,
    /// Any other storage type, given verbatim.
    Custom(String),
}

impl ColumnKind {
    /// Returns the storage type used in the schema description.
    #[must_use]
    pub fn storage_type(&self) -> &str {
        match self {
            Self::Text => "character varying(255)",
            Self::Number => "bigint",
            Self::Boolean => "boolean",
            Self::DateTime => "timestamp without time zone",
            Self::Serial | Self::Integer => "integer",
            Self::Custom(sql) => sql,
        }
    }

    /// Returns the default expression implied by the kind.
    #[must_use]
    pub fn implied_default(&self, table: &str) -> Option<DefaultValue> {
        match self {
            Self::Serial => Some(DefaultValue::Expression(format!(
                "nextval('{}'::regclass)",
                sequence_name(table)
            ))),
            _ => None,
        }
    }

    /// Returns `true` if the kind needs a companion sequence.
    #[must_use]
    pub const fn is_sequence_backed(&self) -> bool {
        matches!(self, Self::Serial)
    }

    /// The kind a column referencing this one should have.
    ///
    /// A reference to a serial is a plain integer: it must not draw from the
    /// referenced table's sequence.
    #[must_use]
    pub fn referencing_kind(&self) -> Self {
        match self {
            Self::Serial => Self::Integer,
            other => other.clone(),
        }
    }
}

/// Name of the sequence backing a serial column of `table`.
#[must_use]
pub fn sequence_name(table: &str) -> String {
    format!("{table}_id_seq")
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g. `now()` or `nextval(...)`).
    Expression(String),
}

impl DefaultValue {
    /// Creates a raw SQL expression default.
    #[must_use]
    pub fn expression(sql: impl Into<String>) -> Self {
        Self::Expression(sql.into())
    }

    /// Returns the SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => {
                if *b {
                    String::from("true")
                } else {
                    String::from("false")
                }
            }
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::String(String::from(value))
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Requested foreign-key registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ForeignKeySpec {
    pub(crate) name: Option<String>,
    pub(crate) referenced_table: String,
    pub(crate) referenced_columns: Vec<String>,
}

/// Requested index registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexSpec {
    pub(crate) name: Option<String>,
    pub(crate) method: IndexMethod,
}

/// Builder accumulating a column specification.
///
/// Columns are NOT NULL unless [`nullable`](Self::nullable) is called.
///
/// # Example
///
/// ```rust
/// use seaquel_core::schema::{boolean, serial, text, IndexMethod, Schema};
///
/// let mut schema = Schema::new();
/// schema
///     .add_table("users")
///     .add_column(serial("id").primary_key())
///     .add_column(text("email").unique())
///     .add_column(boolean("banned").default(false).index_using(IndexMethod::Btree));
///
/// let users = schema.table("users").unwrap();
/// assert_eq!(users.primary_key(), ["id"]);
/// assert_eq!(schema.sequences().len(), 1);
/// ```
#[derive(Clone)]
pub struct ColumnBuilder {
    pub(crate) name: String,
    pub(crate) kind: ColumnKind,
    pub(crate) nullable: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) unique: Option<Option<String>>,
    pub(crate) primary_key: Option<Option<String>>,
    pub(crate) foreign_key: Option<ForeignKeySpec>,
    pub(crate) index: Option<IndexSpec>,
    pub(crate) on_insert: Option<Hook>,
    pub(crate) on_update: Option<Hook>,
}

impl ColumnBuilder {
    /// Creates a new column builder with name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
            unique: None,
            primary_key: None,
            foreign_key: None,
            index: None,
            on_insert: None,
            on_update: None,
        }
    }

    /// Allows NULL values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value, replacing any default implied by the kind.
    #[must_use]
    pub fn default(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Adds a UNIQUE constraint named `<table>_<column>_unique`.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = Some(None);
        self
    }

    /// Adds a UNIQUE constraint with an explicit name.
    #[must_use]
    pub fn unique_named(mut self, name: impl Into<String>) -> Self {
        self.unique = Some(Some(name.into()));
        self
    }

    /// Makes the column the primary key, constraint `<table>_<column>_pk`.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = Some(None);
        self
    }

    /// Makes the column the primary key with an explicit constraint name.
    #[must_use]
    pub fn primary_key_named(mut self, name: impl Into<String>) -> Self {
        self.primary_key = Some(Some(name.into()));
        self
    }

    /// References `columns` of `table`, constraint `<table>_<column>_fk`.
    #[must_use]
    pub fn foreign_key(mut self, table: impl Into<String>, columns: &[&str]) -> Self {
        self.foreign_key = Some(ForeignKeySpec {
            name: None,
            referenced_table: table.into(),
            referenced_columns: columns.iter().map(|c| String::from(*c)).collect(),
        });
        self
    }

    /// References `columns` of `table` with an explicit constraint name.
    #[must_use]
    pub fn foreign_key_named(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        self.foreign_key = Some(ForeignKeySpec {
            name: Some(name.into()),
            referenced_table: table.into(),
            referenced_columns: columns.iter().map(|c| String::from(*c)).collect(),
        });
        self
    }

    /// Indexes the column with the default (GIST) method, named
    /// `index_<table>_<column>`.
    #[must_use]
    pub fn index(self) -> Self {
        self.index_using(IndexMethod::default())
    }

    /// Indexes the column with the given method.
    #[must_use]
    pub fn index_using(mut self, method: IndexMethod) -> Self {
        self.index = Some(IndexSpec { name: None, method });
        self
    }

    /// Indexes the column with an explicit index name and method.
    #[must_use]
    pub fn index_named(mut self, name: impl Into<String>, method: IndexMethod) -> Self {
        self.index = Some(IndexSpec {
            name: Some(name.into()),
            method,
        });
        self
    }

    /// Registers a hook run on every insert.
    #[must_use]
    pub fn on_insert<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<SqlValue>) -> Option<SqlValue> + Send + Sync + 'static,
    {
        self.on_insert = Some(Arc::new(hook));
        self
    }

    /// Registers a hook run on every update.
    #[must_use]
    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<SqlValue>) -> Option<SqlValue> + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(hook));
        self
    }

    pub(crate) fn finish(self, table: &str) -> Column {
        let default = self
            .default
            .or_else(|| self.kind.implied_default(table));
        Column {
            data_type: String::from(self.kind.storage_type()),
            name: self.name,
            table: String::from(table),
            kind: self.kind,
            nullable: self.nullable,
            default,
            on_insert: self.on_insert,
            on_update: self.on_update,
        }
    }
}

impl fmt::Debug for ColumnBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBuilder")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("unique", &self.unique)
            .field("primary_key", &self.primary_key)
            .field("foreign_key", &self.foreign_key)
            .field("index", &self.index)
            .field("on_insert", &self.on_insert.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

/// Creates a text column builder.
#[must_use]
pub fn text(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnKind::Text)
}

/// Creates a 64-bit number column builder.
#[must_use]
pub fn number(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnKind::Number)
}

/// Creates a boolean column builder.
#[must_use]
pub fn boolean(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnKind::Boolean)
}

/// Creates a timestamp column builder.
#[must_use]
pub fn datetime(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnKind::DateTime)
}

/// Creates a sequence-backed serial column builder.
#[must_use]
pub fn serial(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnKind::Serial)
}

/// Creates a 32-bit integer column builder.
#[must_use]
pub fn integer(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnKind::Integer)
}

/// A finalized, immutable column.
#[derive(Clone)]
pub struct Column {
    name: String,
    table: String,
    kind: ColumnKind,
    data_type: String,
    nullable: bool,
    default: Option<DefaultValue>,
    on_insert: Option<Hook>,
    on_update: Option<Hook>,
}

impl Column {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Semantic kind.
    #[must_use]
    pub const fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Storage type.
    #[must_use]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Whether NULL is allowed.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Default value, if any.
    #[must_use]
    pub const fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Insert hook, if any.
    #[must_use]
    pub fn on_insert(&self) -> Option<&Hook> {
        self.on_insert.as_ref()
    }

    /// Update hook, if any.
    #[must_use]
    pub fn on_update(&self) -> Option<&Hook> {
        self.on_update.as_ref()
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("kind", &self.kind)
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("on_insert", &self.on_insert.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}
