#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use seaquel::schema::{boolean, integer, serial, text, IndexMethod, Schema};
use seaquel::{BoxFuture, ConnectOptions, Connection, ConnectionSource, Database, Row, SqlValue};

/// One statement as seen by the fake driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub connection: usize,
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Default)]
struct State {
    log: Mutex<Vec<Entry>>,
    scripted: Mutex<VecDeque<Vec<Row>>>,
    opened: AtomicUsize,
    released: AtomicUsize,
    fail_rollback: AtomicBool,
}

/// In-memory connection source recording every statement per connection.
///
/// Statements containing `NONSENSE` fail like a syntax error. Fetches
/// return scripted rows in order; an unscripted `INSERT` returns a row with
/// a fresh `id`.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<State>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state.log.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.sql).collect()
    }

    /// Connection ids in statement order.
    pub fn connection_ids(&self) -> Vec<usize> {
        self.entries().into_iter().map(|e| e.connection).collect()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.scripted.lock().unwrap().push_back(rows);
    }

    pub fn fail_rollback(&self) {
        self.state.fail_rollback.store(true, Ordering::SeqCst);
    }

    pub fn database(&self, schema: Schema) -> Database {
        Database::with_source(schema, self.clone(), ConnectOptions::default())
    }
}

impl ConnectionSource for Recorder {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, sqlx::Error>> {
        Box::pin(async move {
            let id = self.state.opened.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Box::new(FakeConnection {
                id,
                state: Arc::clone(&self.state),
            }) as Box<dyn Connection>)
        })
    }
}

struct FakeConnection {
    id: usize,
    state: Arc<State>,
}

impl FakeConnection {
    fn record(&self, sql: &str, params: &[SqlValue]) -> Result<(), sqlx::Error> {
        self.state.log.lock().unwrap().push(Entry {
            connection: self.id,
            sql: String::from(sql),
            params: params.to_vec(),
        });
        if sql.contains("NONSENSE") {
            return Err(sqlx::Error::Protocol(String::from(
                "syntax error at or near \"NONSENSE\"",
            )));
        }
        if sql == "ROLLBACK" && self.state.fail_rollback.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol(String::from("connection reset")));
        }
        Ok(())
    }
}

impl Connection for FakeConnection {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            self.record(sql, params)?;
            Ok(1)
        })
    }

    fn fetch<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<Vec<Row>, sqlx::Error>> {
        Box::pin(async move {
            self.record(sql, params)?;
            if let Some(rows) = self.state.scripted.lock().unwrap().pop_front() {
                return Ok(rows);
            }
            if sql.starts_with("INSERT") {
                let mut row = Row::new();
                let id = self.state.log.lock().unwrap().len();
                row.insert("id", SqlValue::Int(i64::try_from(id).unwrap()));
                return Ok(vec![row]);
            }
            Ok(Vec::new())
        })
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// The users/notifications schema.
pub fn schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .add_table("users")
        .add_column(serial("id").primary_key())
        .add_column(text("first_name"))
        .add_column(text("last_name"))
        .add_column(text("email").unique())
        .add_column(boolean("banned").default(false).index_using(IndexMethod::Btree))
        .add_column(text("password").nullable())
        .add_column(integer("likes").default(0))
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

pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (String::from(*k), v.clone()))
        .collect()
}
