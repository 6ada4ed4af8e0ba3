#![allow(dead_code)]

use seaquel_core::builder::{Statement, StatementBuilder};
use seaquel_core::schema::{boolean, integer, text, serial, IndexMethod, Schema};
use seaquel_core::SqlValue;

pub const INVITATION_CODE: &str = "welcome-aboard";

/// The users/notifications pair most tests run against.
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
        .add_column(
            text("invitation_code")
                .on_insert(|_| Some(SqlValue::Text(String::from(INVITATION_CODE)))),
        )
        .add_column(integer("likes").default(0))
        .add_created_at_column("created_at")
        .add_updated_at_column("updated_at");

    let user_id = schema
        .table("users")
        .and_then(|t| t.column("id"))
        .cloned()
        .unwrap_or_else(|| panic!("users.id is registered above"));
    schema
        .add_table("notifications")
        .add_column(serial("id").primary_key())
        .add_column(text("text"))
        .add_foreign_key("user_id", &user_id);
    schema
}

pub fn builder<'s>(schema: &'s Schema, table: &str) -> StatementBuilder<'s> {
    StatementBuilder::for_table(schema, table)
        .unwrap_or_else(|e| panic!("Failed to build for {table}: {e}"))
}

/// Asserts every `$n` in the SQL is within the parameter list and that the
/// placeholders appear as `$1..=$len` in order.
pub fn assert_placeholders(stmt: &Statement) {
    let numbers: Vec<usize> = stmt
        .sql
        .split('$')
        .skip(1)
        .map(|rest| {
            rest.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .unwrap_or_else(|e| panic!("bad placeholder in {}: {e}", stmt.sql))
        })
        .collect();
    let expected: Vec<usize> = (1..=stmt.params.len()).collect();
    assert_eq!(numbers, expected, "placeholders of {}", stmt.sql);
}
