//! Joins resolved through registered foreign keys, and the reshaping of
//! flat joined rows into per-table parts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{BuildError, Result};
use crate::row::Row;
use crate::schema::{ForeignKeyMatch, Schema, Table};

use super::expr::{conditions, qualified, Params};
use super::value::Filter;

/// Longest result label Postgres returns intact (`NAMEDATALEN - 1`).
pub const MAX_LABEL_LEN: usize = 63;

/// Join type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinKind {
    /// INNER JOIN.
    #[default]
    Inner,
    /// LEFT JOIN.
    Left,
}

impl JoinKind {
    /// Returns the SQL keyword(s).
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// A requested join of the base table to a related table.
///
/// The join condition is never written by hand: it comes from the foreign
/// key the base table declares towards `table`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    table: String,
    alias: String,
    through: Option<Vec<String>>,
    filter: Filter,
    kind: JoinKind,
    filter_only: bool,
}

impl Join {
    /// An inner join to `table`, reported under `alias`.
    #[must_use]
    pub fn inner(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(table, alias, JoinKind::Inner)
    }

    /// A left join to `table`, reported under `alias`.
    #[must_use]
    pub fn left(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(table, alias, JoinKind::Left)
    }

    /// A join of the given kind.
    #[must_use]
    pub fn new(table: impl Into<String>, alias: impl Into<String>, kind: JoinKind) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            through: None,
            filter: Filter::new(),
            kind,
            filter_only: false,
        }
    }

    /// Picks the foreign key whose local columns are exactly `columns`.
    #[must_use]
    pub fn through(mut self, columns: &[&str]) -> Self {
        self.through = Some(columns.iter().map(|c| String::from(*c)).collect());
        self
    }

    /// Adds conditions on the joined table.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Uses the join only to narrow the result; it contributes no columns.
    #[must_use]
    pub const fn filter_only(mut self) -> Self {
        self.filter_only = true;
        self
    }

    /// The joined table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Name of this join's part in a [`JoinedRow`].
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Inner or left.
    #[must_use]
    pub const fn kind(&self) -> JoinKind {
        self.kind
    }

    /// Returns `true` if the join contributes no columns.
    #[must_use]
    pub const fn is_filter_only(&self) -> bool {
        self.filter_only
    }

    /// The SQL alias of the joined table: `_<alias>`.
    #[must_use]
    pub fn sql_alias(&self) -> String {
        format!("_{}", self.alias)
    }
}

/// One group of projected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    name: String,
    /// `(label in the flat row, column name)` pairs.
    columns: Vec<(String, String)>,
}

/// The select list of a joined query and how to map its flat rows back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    parts: Vec<Part>,
}

impl Projection {
    /// The part name of the base table.
    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.parts.first().map(|p| p.name.as_str())
    }

    /// Part names in select order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// All flat labels in select order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .flat_map(|p| p.columns.iter().map(|(label, _)| label.as_str()))
    }

    /// Splits a flat row into per-table parts.
    ///
    /// The server returns every selected label, NULL for an unmatched left
    /// join, so a label missing from `row` is an error.
    pub fn reshape(&self, row: &Row) -> Result<JoinedRow> {
        let parts: BTreeMap<String, Row> = self
            .parts
            .iter()
            .map(|part| {
                let values = part
                    .columns
                    .iter()
                    .map(|(label, column)| {
                        row.get(label)
                            .map(|value| (column.clone(), value.clone()))
                            .ok_or_else(|| BuildError::MissingResultColumn(label.clone()))
                    })
                    .collect::<Result<Row>>()?;
                Ok((part.name.clone(), values))
            })
            .collect::<Result<_>>()?;
        Ok(JoinedRow { parts })
    }

    /// Inverse of [`reshape`](Self::reshape).
    #[must_use]
    pub fn flatten(&self, joined: &JoinedRow) -> Row {
        let mut row = Row::new();
        for part in &self.parts {
            let Some(values) = joined.part(&part.name) else {
                continue;
            };
            for (label, column) in &part.columns {
                if let Some(value) = values.get(column) {
                    row.insert(label.clone(), value.clone());
                }
            }
        }
        row
    }
}

/// A joined result row: the base table's part keyed by table name plus one
/// part per non-filter-only join keyed by its alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinedRow {
    parts: BTreeMap<String, Row>,
}

impl JoinedRow {
    /// Returns a part by table name or join alias.
    #[must_use]
    pub fn part(&self, name: &str) -> Option<&Row> {
        self.parts.get(name)
    }

    /// Returns `true` if the part exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Iterates over parts in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Consumes the row, returning its parts.
    #[must_use]
    pub fn into_parts(self) -> BTreeMap<String, Row> {
        self.parts
    }
}

/// Renders the select list and JOIN clauses for `base` and `joins`.
///
/// JOIN conditions are bound into `params`, so the caller must render the
/// WHERE clause afterwards with the same list.
pub(crate) fn render(
    schema: &Schema,
    base: &Table,
    joins: &[Join],
    params: &mut Params<'_>,
) -> Result<(String, Vec<String>, Projection)> {
    let dialect = params.dialect();
    let mut select = Vec::new();
    let mut parts = vec![project(dialect, base, base.name(), base.name(), &mut select)?];
    let mut clauses = Vec::with_capacity(joins.len());
    let mut aliases = vec![base.name()];

    for join in joins {
        if aliases.contains(&join.alias.as_str()) {
            return Err(BuildError::DuplicateJoinAlias(join.alias.clone()));
        }
        aliases.push(&join.alias);

        let joined = schema
            .table(&join.table)
            .ok_or_else(|| BuildError::UnknownTable(join.table.clone()))?;
        let (local, referenced) = resolve(base, join)?;
        let alias = join.sql_alias();

        let mut on: Vec<String> = local
            .iter()
            .zip(referenced.iter())
            .map(|(l, r)| {
                format!(
                    "{} = {}",
                    qualified(dialect, Some(base.name()), l),
                    qualified(dialect, Some(&alias), r)
                )
            })
            .collect();
        on.extend(conditions(params, Some(&alias), &join.filter));

        clauses.push(format!(
            "{} {} {} ON {}",
            join.kind.as_sql(),
            dialect.quote_qualified(joined.namespace(), joined.name()),
            dialect.quote_identifier(&alias),
            on.join(" AND ")
        ));

        if !join.filter_only {
            parts.push(project(dialect, joined, &alias, &join.alias, &mut select)?);
        }
    }

    Ok((select.join(", "), clauses, Projection { parts }))
}

fn resolve<'t>(base: &'t Table, join: &Join) -> Result<(&'t [String], &'t [String])> {
    match base.find_foreign_key(&join.table, join.through.as_deref()) {
        ForeignKeyMatch::Unique(constraint) => constraint
            .reference()
            .map(|(_, referenced)| (constraint.columns.as_slice(), referenced))
            .ok_or_else(|| no_foreign_key(base, join)),
        ForeignKeyMatch::Ambiguous(candidates) => Err(BuildError::AmbiguousJoin {
            table: String::from(base.name()),
            referenced: join.table.clone(),
            candidates,
        }),
        ForeignKeyMatch::Missing => Err(no_foreign_key(base, join)),
    }
}

fn no_foreign_key(base: &Table, join: &Join) -> BuildError {
    BuildError::NoForeignKey {
        table: String::from(base.name()),
        referenced: join.table.clone(),
        through: join.through.clone(),
    }
}

fn project(
    dialect: &dyn Dialect,
    table: &Table,
    qualifier: &str,
    part: &str,
    select: &mut Vec<String>,
) -> Result<Part> {
    let mut columns = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        let label = format!("{qualifier}_{}", column.name());
        if label.len() > MAX_LABEL_LEN {
            return Err(BuildError::LabelTooLong {
                label,
                max: MAX_LABEL_LEN,
            });
        }
        select.push(format!(
            "{} AS {}",
            qualified(dialect, Some(qualifier), column.name()),
            dialect.quote_identifier(&label)
        ));
        columns.push((label, String::from(column.name())));
    }
    Ok(Part {
        name: String::from(part),
        columns,
    })
}
