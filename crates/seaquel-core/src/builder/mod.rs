//! Statement builder.
//!
//! Turns a registered table plus a value object into parameterized SQL.
//! Caller values are always bound; only identifiers (quoted) and the
//! trusted pieces documented on [`Filter`] and [`SelectOptions`] end up in
//! the SQL text.
//!
//! # Example
//!
//! ```rust
//! use seaquel_core::builder::{incr, Filter, StatementBuilder, Values};
//! use seaquel_core::schema::{number, serial, text, Schema};
//!
//! let mut schema = Schema::new();
//! schema
//!     .add_table("users")
//!     .add_column(serial("id").primary_key())
//!     .add_column(text("email"))
//!     .add_column(number("likes").default(0));
//!
//! let users = StatementBuilder::for_table(&schema, "users").unwrap();
//! let stmt = users
//!     .update(&Values::new().set("id", 1).set("likes", incr(-20)))
//!     .unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     r#"UPDATE "public"."users" SET "likes" = "likes" - $1 WHERE "id" = $2"#
//! );
//!
//! let stmt = users
//!     .select_all(&Filter::new().and("id >", 10), &Default::default())
//!     .unwrap();
//! assert_eq!(stmt.sql, r#"SELECT * FROM "public"."users" WHERE "id" > $1"#);
//! ```

mod expr;
mod join;
pub mod value;

use serde::Serialize;

use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{BuildError, Result};
use crate::schema::{Column, Hook, Schema, Table};

pub use expr::{condition, conditions, qualified, split_key, Params};
pub use join::{Join, JoinKind, JoinedRow, Projection};
pub use value::{incr, Filter, SqlValue, ToSqlValue, Value, Values};

/// A finished statement: SQL text and the values for its placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// SQL text with `$n` placeholders.
    pub sql: String,
    /// Values for the placeholders, `$1` first.
    pub params: Vec<SqlValue>,
}

/// Trailing clauses of a SELECT.
///
/// `group_by` and `order_by` are written into the SQL verbatim and must
/// never carry end-user input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// `GROUP BY` expression, verbatim.
    pub group_by: Option<String>,
    /// `ORDER BY` expression, verbatim.
    pub order_by: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
}

impl SelectOptions {
    /// No trailing clauses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `GROUP BY` expression.
    #[must_use]
    pub fn group_by(mut self, sql: impl Into<String>) -> Self {
        self.group_by = Some(sql.into());
        self
    }

    /// Sets the `ORDER BY` expression.
    #[must_use]
    pub fn order_by(mut self, sql: impl Into<String>) -> Self {
        self.order_by = Some(sql.into());
        self
    }

    /// Sets `LIMIT`.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets `OFFSET`.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn render(&self) -> String {
        let mut sql = String::new();
        if let Some(group_by) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }
}

/// Builds statements for one table of a schema.
///
/// Holds only borrowed schema data, so building is free of side effects
/// and safe from any number of tasks at once.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'s> {
    schema: &'s Schema,
    table: &'s Table,
    dialect: PostgresDialect,
}

impl<'s> StatementBuilder<'s> {
    /// Creates a builder for the table called `name`.
    pub fn for_table(schema: &'s Schema, name: &str) -> Result<Self> {
        let table = schema
            .table(name)
            .ok_or_else(|| BuildError::UnknownTable(String::from(name)))?;
        Ok(Self {
            schema,
            table,
            dialect: PostgresDialect::new(),
        })
    }

    /// The table statements are built for.
    #[must_use]
    pub const fn table(&self) -> &'s Table {
        self.table
    }

    fn target(&self) -> String {
        self.dialect
            .quote_qualified(self.table.namespace(), self.table.name())
    }

    /// `INSERT ... RETURNING *`.
    ///
    /// Insert hooks run first, over every column. Absent keys are left out
    /// so column defaults apply.
    pub fn insert(&self, values: &Values) -> Result<Statement> {
        let values = self.apply_hooks(values, |c| c.on_insert());
        let mut params = Params::new(&self.dialect);
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());

        for (column, value) in values.iter() {
            let Value::Sql(value) = value else {
                return Err(BuildError::IncrementNotAllowed(String::from(column)));
            };
            columns.push(self.dialect.quote_identifier(column));
            placeholders.push(params.bind(value.clone()));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.target())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.target(),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    /// `UPDATE ... SET <non-key columns> WHERE <primary key>`.
    ///
    /// Every primary-key column must be present in `values`.
    pub fn update(&self, values: &Values) -> Result<Statement> {
        let values = self.apply_hooks(values, |c| c.on_update());
        let key = self.primary_key_filter(&values)?;

        let mut set = Values::new();
        for (column, value) in values.iter() {
            if !self.is_primary_key(column) {
                set.insert(column, value.clone());
            }
        }
        if set.is_empty() {
            return Err(BuildError::EmptySet(String::from(self.table.name())));
        }

        let mut params = Params::new(&self.dialect);
        let assignments = self.assignments(&set, &mut params)?;
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.target(),
            assignments,
            where_clause(&mut params, None, &key)
        );
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    /// `UPDATE ... SET <values> WHERE <filter>`.
    ///
    /// An empty filter updates every row.
    pub fn update_where(&self, values: &Values, filter: &Filter) -> Result<Statement> {
        let values = self.apply_hooks(values, |c| c.on_update());
        if values.is_empty() {
            return Err(BuildError::EmptySet(String::from(self.table.name())));
        }

        let mut params = Params::new(&self.dialect);
        let assignments = self.assignments(&values, &mut params)?;
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.target(),
            assignments,
            where_clause(&mut params, None, filter)
        );
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    /// `DELETE ... WHERE <primary key>`.
    pub fn delete(&self, values: &Values) -> Result<Statement> {
        let key = self.primary_key_filter(values)?;
        self.delete_where(&key)
    }

    /// `DELETE ... WHERE <filter>`. An empty filter deletes every row.
    pub fn delete_where(&self, filter: &Filter) -> Result<Statement> {
        let mut params = Params::new(&self.dialect);
        let sql = format!(
            "DELETE FROM {}{}",
            self.target(),
            where_clause(&mut params, None, filter)
        );
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    /// `SELECT * ... WHERE <filter> LIMIT 1`.
    pub fn select_one(&self, filter: &Filter) -> Result<Statement> {
        self.select_all(filter, &SelectOptions::new().limit(1))
    }

    /// `SELECT * ... WHERE <filter>` plus the trailing clauses of `options`.
    pub fn select_all(&self, filter: &Filter, options: &SelectOptions) -> Result<Statement> {
        let mut params = Params::new(&self.dialect);
        let sql = format!(
            "SELECT * FROM {}{}{}",
            self.target(),
            where_clause(&mut params, None, filter),
            options.render()
        );
        Ok(Statement {
            sql,
            params: params.into_values(),
        })
    }

    /// A SELECT joined to related tables through registered foreign keys.
    ///
    /// Returns the statement and the [`Projection`] that splits its rows
    /// into per-table parts. Filter keys apply to the base table and are
    /// qualified with its name.
    pub fn select_joined(
        &self,
        filter: &Filter,
        options: &SelectOptions,
        joins: &[Join],
    ) -> Result<(Statement, Projection)> {
        let mut params = Params::new(&self.dialect);
        let (select, clauses, projection) = join::render(self.schema, self.table, joins, &mut params)?;

        let mut sql = format!("SELECT {select} FROM {}", self.target());
        for clause in &clauses {
            sql.push(' ');
            sql.push_str(clause);
        }
        let qualifier = (!joins.is_empty()).then(|| self.table.name());
        sql.push_str(&where_clause(&mut params, qualifier, filter));
        sql.push_str(&options.render());

        Ok((
            Statement {
                sql,
                params: params.into_values(),
            },
            projection,
        ))
    }

    fn is_primary_key(&self, column: &str) -> bool {
        self.table.primary_key().iter().any(|pk| pk == column)
    }

    fn primary_key_filter(&self, values: &Values) -> Result<Filter> {
        if self.table.primary_key().is_empty() {
            return Err(BuildError::NoPrimaryKey(String::from(self.table.name())));
        }
        let mut filter = Filter::new();
        for column in self.table.primary_key() {
            match values.get(column) {
                Some(Value::Sql(value)) => filter = filter.and(column.as_str(), value.clone()),
                Some(Value::Increment(_)) => {
                    return Err(BuildError::IncrementNotAllowed(column.clone()));
                }
                None => {
                    return Err(BuildError::MissingPrimaryKey {
                        table: String::from(self.table.name()),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(filter)
    }

    fn assignments(&self, values: &Values, params: &mut Params<'_>) -> Result<String> {
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            let quoted = self.dialect.quote_identifier(column);
            let assignment = match value {
                Value::Sql(value) => format!("{quoted} = {}", params.bind(value.clone())),
                Value::Increment(amount) => {
                    let sign = if *amount < 0 { '-' } else { '+' };
                    let magnitude = amount
                        .checked_abs()
                        .ok_or_else(|| BuildError::IncrementOutOfRange(String::from(column)))?;
                    let placeholder = params.bind(SqlValue::Int(magnitude));
                    format!("{quoted} = {quoted} {sign} {placeholder}")
                }
            };
            assignments.push(assignment);
        }
        Ok(assignments.join(", "))
    }

    /// Runs the selected hook of every column over `values`.
    ///
    /// A hook returning `None` makes the column absent. Increments are
    /// passed through untouched.
    fn apply_hooks<F>(&self, values: &Values, hook_of: F) -> Values
    where
        F: Fn(&Column) -> Option<&Hook>,
    {
        let mut values = values.clone();
        for column in self.table.columns() {
            let Some(hook) = hook_of(column) else {
                continue;
            };
            let current = match values.get(column.name()) {
                Some(Value::Increment(_)) => continue,
                Some(Value::Sql(value)) => Some(value.clone()),
                None => None,
            };
            match hook(current) {
                Some(value) => {
                    values.insert(column.name(), value);
                }
                None => {
                    values.remove(column.name());
                }
            }
        }
        values
    }
}

fn where_clause(params: &mut Params<'_>, qualifier: Option<&str>, filter: &Filter) -> String {
    if filter.is_empty() {
        return String::new();
    }
    format!(" WHERE {}", conditions(params, qualifier, filter).join(" AND "))
}
