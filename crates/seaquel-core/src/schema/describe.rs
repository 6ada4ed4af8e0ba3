//! Plain description of a schema, the shape exchanged with the schema-diff
//! collaborator.
//!
//! Unlike [`Table`](super::Table), descriptions carry no hooks and are
//! (de)serializable, so a live database can be described in the same terms
//! and the two compared.

use serde::{Deserialize, Serialize};

use super::{Column, Constraint, Index, Schema, Sequence, Table};

/// A described column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    /// Column name.
    pub name: String,
    /// Storage type as written in DDL.
    pub data_type: String,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Default expression as SQL text.
    pub default_value: Option<String>,
}

impl From<&Column> for ColumnDescription {
    fn from(column: &Column) -> Self {
        Self {
            name: String::from(column.name()),
            data_type: String::from(column.data_type()),
            nullable: column.is_nullable(),
            default_value: column.default_value().map(|d| d.to_sql()),
        }
    }
}

/// A described constraint. `type` is `primary`, `unique` or `foreign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDescription {
    /// Constraint name.
    pub name: String,
    /// `primary`, `unique` or `foreign`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Constrained columns, in declaration order.
    pub columns: Vec<String>,
    /// Referenced table of a foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_table: Option<String>,
    /// Referenced columns of a foreign key, paired with `columns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_columns: Option<Vec<String>>,
}

impl From<&Constraint> for ConstraintDescription {
    fn from(constraint: &Constraint) -> Self {
        let reference = constraint.reference();
        Self {
            name: constraint.name.clone(),
            kind: String::from(constraint.kind.as_str()),
            columns: constraint.columns.clone(),
            referenced_table: reference.map(|(table, _)| String::from(table)),
            referenced_columns: reference.map(|(_, columns)| columns.to_vec()),
        }
    }
}

/// A described index. `type` is the access method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescription {
    /// Index name.
    pub name: String,
    /// Access method, e.g. `GIST`.
    #[serde(rename = "type")]
    pub method: String,
    /// Indexed columns.
    pub columns: Vec<String>,
}

impl From<&Index> for IndexDescription {
    fn from(index: &Index) -> Self {
        Self {
            name: index.name.clone(),
            method: String::from(index.method.as_sql()),
            columns: index.columns.clone(),
        }
    }
}

/// A described table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    /// Table name.
    pub name: String,
    /// Namespace, `public` unless declared otherwise.
    pub schema: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescription>,
    /// Primary-key, unique and foreign-key constraints.
    pub constraints: Vec<ConstraintDescription>,
    /// Indexes.
    pub indexes: Vec<IndexDescription>,
}

impl TableDescription {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl From<&Table> for TableDescription {
    fn from(table: &Table) -> Self {
        Self {
            name: String::from(table.name()),
            schema: String::from(table.namespace()),
            columns: table.columns().iter().map(Into::into).collect(),
            constraints: table.constraints().iter().map(Into::into).collect(),
            indexes: table.indexes().iter().map(Into::into).collect(),
        }
    }
}

/// A described schema: tables in registration order plus sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// Dialect tag, `postgres`.
    pub dialect: String,
    /// Tables in registration order.
    pub tables: Vec<TableDescription>,
    /// Sequences backing serial columns.
    pub sequences: Vec<Sequence>,
}

impl SchemaDescription {
    /// Describes an in-memory schema.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            dialect: String::from(schema.dialect()),
            tables: schema.tables().iter().map(Into::into).collect(),
            sequences: schema.sequences().into_iter().cloned().collect(),
        }
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables.iter().rev().find(|t| t.name == name)
    }
}
