//! Per-table handles.

use seaquel_core::builder::{Filter, Join, JoinedRow, SelectOptions, StatementBuilder, Values};
use seaquel_core::{BuildError, Row};

use crate::database::Database;
use crate::error::{Error, Result};

/// CRUD on one registered table.
///
/// Statements run on the ambient transaction's connection when there is
/// one, otherwise on a pooled connection for just that statement.
#[derive(Debug, Clone)]
pub struct Manager {
    database: Database,
    table: String,
}

impl Manager {
    pub(crate) fn new(database: Database, table: &str) -> Result<Self> {
        if database.schema().table(table).is_none() {
            return Err(BuildError::UnknownTable(String::from(table)).into());
        }
        Ok(Self {
            database,
            table: String::from(table),
        })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.table
    }

    fn builder(&self) -> Result<StatementBuilder<'_>> {
        Ok(StatementBuilder::for_table(self.database.schema(), &self.table)?)
    }

    /// Inserts a row and returns it as stored, defaults included.
    pub async fn insert(&self, values: &Values) -> Result<Row> {
        let statement = self.builder()?.insert(values)?;
        self.database
            .fetch_statement(&statement)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoRowReturned(statement.sql))
    }

    /// Updates the row addressed by the primary key in `values`.
    pub async fn update(&self, values: &Values) -> Result<u64> {
        let statement = self.builder()?.update(values)?;
        self.database.execute_statement(&statement).await
    }

    /// Updates every row matching `filter`.
    pub async fn update_where(&self, values: &Values, filter: &Filter) -> Result<u64> {
        let statement = self.builder()?.update_where(values, filter)?;
        self.database.execute_statement(&statement).await
    }

    /// Deletes the row addressed by the primary key in `values`.
    pub async fn delete(&self, values: &Values) -> Result<u64> {
        let statement = self.builder()?.delete(values)?;
        self.database.execute_statement(&statement).await
    }

    /// Deletes every row matching `filter`.
    pub async fn delete_where(&self, filter: &Filter) -> Result<u64> {
        let statement = self.builder()?.delete_where(filter)?;
        self.database.execute_statement(&statement).await
    }

    /// First row matching `filter`.
    pub async fn select_one(&self, filter: &Filter) -> Result<Option<Row>> {
        let statement = self.builder()?.select_one(filter)?;
        Ok(self
            .database
            .fetch_statement(&statement)
            .await?
            .into_iter()
            .next())
    }

    /// Every row matching `filter`.
    pub async fn select_all(&self, filter: &Filter, options: &SelectOptions) -> Result<Vec<Row>> {
        let statement = self.builder()?.select_all(filter, options)?;
        self.database.fetch_statement(&statement).await
    }

    /// Every row matching `filter`, joined to related tables and split into
    /// per-table parts.
    pub async fn select_joined(
        &self,
        filter: &Filter,
        options: &SelectOptions,
        joins: &[Join],
    ) -> Result<Vec<JoinedRow>> {
        let (statement, projection) = self.builder()?.select_joined(filter, options, joins)?;
        let rows = self.database.fetch_statement(&statement).await?;
        rows.iter()
            .map(|row| projection.reshape(row).map_err(Error::from))
            .collect()
    }
}
