//! In-memory schema registry.
//!
//! Tables are declared once at startup; afterwards the [`Schema`] is only
//! read, so it can be shared freely between concurrent callers.

mod column;
mod constraint;
pub mod describe;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::builder::value::SqlValue;
use crate::dialect::{Dialect, PostgresDialect};

pub use column::{
    boolean, datetime, integer, number, sequence_name, serial, text, Column, ColumnBuilder,
    ColumnKind, DefaultValue, Hook,
};
pub use constraint::{Constraint, ConstraintKind, ForeignKeyMatch, Index, IndexMethod};
pub use describe::SchemaDescription;

use constraint::ForeignKeyIndex;

/// Namespace tables are created in.
pub const DEFAULT_NAMESPACE: &str = "public";

/// Synthetic description of the sequence backing a serial column.
///
/// Bounds and increment mirror a 64-bit signed counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// Counter type, `bigint`.
    pub data_type: String,
    /// Bits of precision.
    pub numeric_precision: u32,
    /// Radix of `numeric_precision`.
    pub numeric_precision_radix: u32,
    /// Digits after the decimal point, always 0.
    pub numeric_scale: u32,
    /// First value handed out.
    pub start_value: String,
    /// Lower bound.
    pub minimum_value: String,
    /// Upper bound.
    pub maximum_value: String,
    /// Step between values.
    pub increment: String,
    /// Namespace of the sequence.
    pub schema: String,
    /// `<table>_id_seq`.
    pub name: String,
    /// Whether the sequence wraps around at its bounds.
    pub cycle: bool,
}

impl Sequence {
    /// The sequence backing the serial column of `table`.
    #[must_use]
    pub fn for_table(table: &str) -> Self {
        Self {
            data_type: String::from("bigint"),
            numeric_precision: 64,
            numeric_precision_radix: 2,
            numeric_scale: 0,
            start_value: String::from("1"),
            minimum_value: String::from("1"),
            maximum_value: i64::MAX.to_string(),
            increment: String::from("1"),
            schema: String::from(DEFAULT_NAMESPACE),
            name: sequence_name(table),
            cycle: false,
        }
    }
}

/// A registered table.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    namespace: String,
    columns: Vec<Column>,
    constraints: Vec<Constraint>,
    indexes: Vec<Index>,
    primary_key: Vec<String>,
    sequences: Vec<Sequence>,
    foreign_keys: ForeignKeyIndex,
}

impl Table {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: String::from(DEFAULT_NAMESPACE),
            columns: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
            primary_key: Vec::new(),
            sequences: Vec::new(),
            foreign_keys: ForeignKeyIndex::default(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema namespace (`public`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// All constraints in registration order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// All indexes.
    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Primary-key column names.
    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Sequences registered by serial columns of this table.
    #[must_use]
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Finalizes a column definition and registers everything it asks for.
    pub fn add_column(&mut self, builder: ColumnBuilder) -> &mut Self {
        let column_name = builder.name.clone();
        let unique = builder.unique.clone();
        let primary_key = builder.primary_key.clone();
        let foreign_key = builder.foreign_key.clone();
        let index = builder.index.clone();
        let needs_sequence = builder.kind.is_sequence_backed();

        let column = builder.finish(&self.name);
        self.columns.push(column);

        if needs_sequence {
            self.sequences.push(Sequence::for_table(&self.name));
        }
        if let Some(name) = primary_key {
            let name = name.unwrap_or_else(|| format!("{}_{column_name}_pk", self.name));
            self.add_primary_key(name, &[column_name.as_str()]);
        }
        if let Some(name) = unique {
            let name = name.unwrap_or_else(|| format!("{}_{column_name}_unique", self.name));
            self.add_unique(name, &[column_name.as_str()]);
        }
        if let Some(spec) = foreign_key {
            let name = spec
                .name
                .unwrap_or_else(|| format!("{}_{column_name}_fk", self.name));
            self.add_constraint(Constraint {
                name,
                kind: ConstraintKind::Foreign {
                    referenced_table: spec.referenced_table,
                    referenced_columns: spec.referenced_columns,
                },
                columns: vec![column_name.clone()],
            });
        }
        if let Some(spec) = index {
            let name = spec
                .name
                .unwrap_or_else(|| format!("index_{}_{column_name}", self.name));
            self.indexes.push(Index {
                name,
                method: spec.method,
                columns: vec![column_name],
            });
        }
        self
    }

    /// Adds a column typed like `referenced` plus a foreign key to it.
    pub fn add_foreign_key(&mut self, name: impl Into<String>, referenced: &Column) -> &mut Self {
        let builder = ColumnBuilder::new(name, referenced.kind().referencing_kind())
            .foreign_key(referenced.table(), &[referenced.name()]);
        self.add_column(builder)
    }

    /// Adds a timestamp column stamped with the current time on insert.
    pub fn add_created_at_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_column(datetime(name).on_insert(|_| Some(now())))
    }

    /// Adds a timestamp column stamped with the current time on insert and
    /// on every update.
    pub fn add_updated_at_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_column(
            datetime(name)
                .on_insert(|_| Some(now()))
                .on_update(|_| Some(now())),
        )
    }

    /// Adds a (possibly composite) primary key.
    pub fn add_primary_key(&mut self, name: impl Into<String>, columns: &[&str]) -> &mut Self {
        self.primary_key
            .extend(columns.iter().map(|c| String::from(*c)));
        self.add_constraint(Constraint {
            name: name.into(),
            kind: ConstraintKind::Primary,
            columns: columns.iter().map(|c| String::from(*c)).collect(),
        })
    }

    /// Adds a (possibly composite) unique constraint.
    pub fn add_unique(&mut self, name: impl Into<String>, columns: &[&str]) -> &mut Self {
        self.add_constraint(Constraint {
            name: name.into(),
            kind: ConstraintKind::Unique,
            columns: columns.iter().map(|c| String::from(*c)).collect(),
        })
    }

    /// Adds a (possibly composite) foreign key.
    pub fn add_reference(
        &mut self,
        name: impl Into<String>,
        columns: &[&str],
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> &mut Self {
        self.add_constraint(Constraint {
            name: name.into(),
            kind: ConstraintKind::Foreign {
                referenced_table: referenced_table.into(),
                referenced_columns: referenced_columns.iter().map(|c| String::from(*c)).collect(),
            },
            columns: columns.iter().map(|c| String::from(*c)).collect(),
        })
    }

    fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.foreign_keys
            .register(self.constraints.len(), &constraint);
        self.constraints.push(constraint);
        self
    }

    /// Finds the foreign key to `referenced`, optionally restricted to the
    /// given local columns.
    #[must_use]
    pub fn find_foreign_key(&self, referenced: &str, through: Option<&[String]>) -> ForeignKeyMatch<'_> {
        self.foreign_keys
            .lookup(&self.constraints, referenced, through)
    }

    /// Renders the quoted column list.
    ///
    /// With an alias every column is qualified (`"u"."id"`); with `rename`
    /// it is also renamed to `"<alias>_<column>"`.
    #[must_use]
    pub fn columns_sql(&self, alias: Option<&str>, rename: bool) -> String {
        let dialect = PostgresDialect::new();
        self.columns
            .iter()
            .map(|column| {
                let quoted = dialect.quote_identifier(column.name());
                match alias {
                    Some(alias) if rename => format!(
                        "{}.{quoted} AS {}",
                        dialect.quote_identifier(alias),
                        dialect.quote_identifier(&format!("{alias}_{}", column.name()))
                    ),
                    Some(alias) => format!("{}.{quoted}", dialect.quote_identifier(alias)),
                    None => quoted,
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn now() -> SqlValue {
    SqlValue::Timestamp(Utc::now().naive_utc())
}

/// Root of the in-memory model: ordered tables plus their sequences.
#[derive(Debug, Clone)]
pub struct Schema {
    dialect: &'static str,
    tables: Vec<Table>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Creates an empty PostgreSQL schema.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dialect: PostgresDialect::new().name(),
            tables: Vec::new(),
        }
    }

    /// Dialect tag.
    #[must_use]
    pub const fn dialect(&self) -> &'static str {
        self.dialect
    }

    /// Registers a new table and returns it for column definitions.
    ///
    /// Names are not checked for duplicates; lookups resolve to the table
    /// registered last.
    pub fn add_table(&mut self, name: impl Into<String>) -> &mut Table {
        let position = self.tables.len();
        self.tables.push(Table::new(name));
        &mut self.tables[position]
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().rev().find(|t| t.name() == name)
    }

    /// Looks up a table by name for further definitions.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().rev().find(|t| t.name() == name)
    }

    /// Table names in registration order.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(Table::name).collect()
    }

    /// All tables in registration order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// All sequences, in table order.
    #[must_use]
    pub fn sequences(&self) -> Vec<&Sequence> {
        self.tables.iter().flat_map(|t| t.sequences.iter()).collect()
    }

    /// Builds the description handed to the schema-diff collaborator.
    #[must_use]
    pub fn describe(&self) -> SchemaDescription {
        SchemaDescription::from_schema(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_and_notifications() -> Schema {
        let mut schema = Schema::new();
        schema
            .add_table("users")
            .add_column(serial("id").primary_key())
            .add_column(text("email").unique())
            .add_column(boolean("banned").index_using(IndexMethod::Btree).default(false))
            .add_column(text("password").nullable())
            .add_created_at_column("created_at")
            .add_updated_at_column("updated_at");

        let user_id = schema
            .table("users")
            .and_then(|t| t.column("id"))
            .cloned()
            .unwrap();
        schema
            .add_table("notifications")
            .add_column(serial("id").primary_key())
            .add_column(text("text"))
            .add_foreign_key("user_id", &user_id);
        schema
    }

    #[test]
    fn test_add_and_get_tables() {
        let schema = users_and_notifications();
        assert_eq!(schema.table_names(), vec!["users", "notifications"]);
        assert!(schema.table("users").is_some());
        assert!(schema.table("missing").is_none());
        assert_eq!(schema.dialect(), "postgres");
    }

    #[test]
    fn test_default_constraint_names() {
        let schema = users_and_notifications();
        let users = schema.table("users").unwrap();
        let names: Vec<&str> = users.constraints().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["users_id_pk", "users_email_unique"]);
        assert_eq!(users.primary_key(), ["id"]);

        let index = &users.indexes()[0];
        assert_eq!(index.name, "index_users_banned");
        assert_eq!(index.method, IndexMethod::Btree);
    }

    #[test]
    fn test_serial_registers_sequence() {
        let schema = users_and_notifications();
        let names: Vec<&str> = schema.sequences().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["users_id_seq", "notifications_id_seq"]);

        let seq = schema.sequences()[0];
        assert_eq!(seq.maximum_value, "9223372036854775807");
        assert_eq!(seq.numeric_precision, 64);
        assert!(!seq.cycle);
    }

    #[test]
    fn test_add_foreign_key_copies_type() {
        let schema = users_and_notifications();
        let notifications = schema.table("notifications").unwrap();
        let user_id = notifications.column("user_id").unwrap();

        assert_eq!(user_id.data_type(), "integer");
        assert!(user_id.default_value().is_none());

        let fk = &notifications.constraints()[1];
        assert_eq!(fk.name, "notifications_user_id_fk");
        assert_eq!(
            fk.reference(),
            Some(("users", &[String::from("id")][..]))
        );
        // Only the referencing table's own serial registers a sequence.
        assert_eq!(notifications.sequences().len(), 1);
    }

    #[test]
    fn test_timestamp_columns_have_hooks() {
        let schema = users_and_notifications();
        let users = schema.table("users").unwrap();

        let created = users.column("created_at").unwrap();
        assert!(created.on_insert().is_some());
        assert!(created.on_update().is_none());

        let updated = users.column("updated_at").unwrap();
        assert!(updated.on_insert().is_some());
        assert!(updated.on_update().is_some());
    }

    #[test]
    fn test_duplicate_table_names_are_accepted() {
        let mut schema = Schema::new();
        schema.add_table("dup").add_column(text("a"));
        schema.add_table("dup").add_column(text("b"));

        assert_eq!(schema.table_names(), vec!["dup", "dup"]);
        assert!(schema.table("dup").unwrap().column("b").is_some());
    }

    #[test]
    fn test_composite_constraints() {
        let mut schema = Schema::new();
        schema
            .add_table("memberships")
            .add_column(integer("group_id"))
            .add_column(integer("user_id"))
            .add_primary_key("memberships_pk", &["group_id", "user_id"])
            .add_reference("memberships_user_fk", &["user_id"], "users", &["id"]);

        let table = schema.table("memberships").unwrap();
        assert_eq!(table.primary_key(), ["group_id", "user_id"]);
        assert!(matches!(
            table.find_foreign_key("users", None),
            ForeignKeyMatch::Unique(c) if c.name == "memberships_user_fk"
        ));
    }

    #[test]
    fn test_columns_sql() {
        let mut schema = Schema::new();
        schema
            .add_table("users")
            .add_column(serial("id"))
            .add_column(text("email"));
        let users = schema.table("users").unwrap();

        assert_eq!(users.columns_sql(None, false), r#""id", "email""#);
        assert_eq!(
            users.columns_sql(Some("u"), true),
            r#""u"."id" AS "u_id", "u"."email" AS "u_email""#
        );
        assert_eq!(
            users.columns_sql(Some("u"), false),
            r#""u"."id", "u"."email""#
        );
    }
}
