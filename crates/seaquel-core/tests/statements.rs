//! Statement-building tests against the users/notifications schema.

mod common;

use common::{assert_placeholders, builder, schema, INVITATION_CODE};
use seaquel_core::builder::{incr, Filter, SelectOptions, Values};
use seaquel_core::{BuildError, SqlValue};

#[test]
fn insert_runs_hooks_for_absent_columns() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .insert(
            &Values::new()
                .set("first_name", "Luke")
                .set("last_name", "Skywalker")
                .set("email", "luke@rebels.org"),
        )
        .unwrap();

    assert!(stmt.sql.starts_with(
        r#"INSERT INTO "public"."users" ("first_name", "last_name", "email", "invitation_code", "created_at", "updated_at") VALUES ($1, $2, $3, $4, $5, $6)"#
    ));
    assert!(stmt.sql.ends_with("RETURNING *"));
    assert_eq!(stmt.params[3], SqlValue::Text(String::from(INVITATION_CODE)));
    assert!(stmt.params[4].as_timestamp().is_some());
    assert!(stmt.params[5].as_timestamp().is_some());
    assert_placeholders(&stmt);
}

#[test]
fn insert_hook_overrides_caller_value() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .insert(&Values::new().set("invitation_code", "forged"))
        .unwrap();

    assert!(stmt.sql.contains(r#"("invitation_code", "created_at", "updated_at")"#));
    assert_eq!(stmt.params[0], SqlValue::Text(String::from(INVITATION_CODE)));
}

#[test]
fn absent_and_null_differ() {
    let schema = schema();
    let users = builder(&schema, "users");

    let without = users.insert(&Values::new().set("email", "a@b.c")).unwrap();
    assert!(!without.sql.contains(r#""password""#));

    let with_null = users
        .insert(&Values::new().set("email", "a@b.c").set("password", SqlValue::Null))
        .unwrap();
    assert!(with_null.sql.contains(r#""email", "password""#));
    assert_eq!(with_null.params[1], SqlValue::Null);
    assert_eq!(with_null.params.len(), without.params.len() + 1);
}

#[test]
fn update_stamps_updated_at_only() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .update(&Values::new().set("id", 1).set("first_name", "Anakin"))
        .unwrap();

    assert_eq!(
        stmt.sql,
        r#"UPDATE "public"."users" SET "first_name" = $1, "updated_at" = $2 WHERE "id" = $3"#
    );
    assert_eq!(stmt.params[2], SqlValue::Int(1));
    assert_placeholders(&stmt);
}

#[test]
fn update_never_sets_primary_key() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .update(&Values::new().set("email", "x@y.z").set("id", 9))
        .unwrap();

    let set_clause = stmt.sql.split(" WHERE ").next().unwrap();
    assert!(!set_clause.contains(r#""id""#));
    assert!(stmt.sql.ends_with(r#"WHERE "id" = $3"#));
}

#[test]
fn increment_and_decrement() {
    let schema = schema();
    let users = builder(&schema, "users");

    let up = users
        .update_where(&Values::new().set("likes", incr(100)), &Filter::new().and("id", 1))
        .unwrap();
    assert!(up.sql.contains(r#""likes" = "likes" + $1"#));
    assert_eq!(up.params[0], SqlValue::Int(100));

    let down = users
        .update_where(&Values::new().set("likes", incr(-20)), &Filter::new().and("id", 1))
        .unwrap();
    assert!(down.sql.contains(r#""likes" = "likes" - $1"#));
    assert_eq!(down.params[0], SqlValue::Int(20));
    assert_placeholders(&down);
}

#[test]
fn increment_is_rejected_as_primary_key() {
    let schema = schema();
    let users = builder(&schema, "users");
    let err = users
        .update(&Values::new().set("id", incr(1)).set("email", "x"))
        .unwrap_err();
    assert_eq!(err, BuildError::IncrementNotAllowed(String::from("id")));
}

#[test]
fn operator_keys_bind_exactly_one_param() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .select_all(
            &Filter::new().and("id >", 0).and("likes <=", 10).and("email LIKE", "%@rebels.org"),
            &SelectOptions::new(),
        )
        .unwrap();

    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "public"."users" WHERE "id" > $1 AND "likes" <= $2 AND "email" LIKE $3"#
    );
    assert_eq!(stmt.params.len(), 3);
}

#[test]
fn operator_with_null_is_not_bound() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .select_all(
            &Filter::new().and("password IS NOT", SqlValue::Null).and("banned", false),
            &SelectOptions::new(),
        )
        .unwrap();

    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "public"."users" WHERE "password" IS NOT NULL AND "banned" = $1"#
    );
    assert_eq!(stmt.params, vec![SqlValue::Bool(false)]);
}

#[test]
fn placeholders_follow_params_across_set_and_where() {
    let schema = schema();
    let users = builder(&schema, "users");
    let stmt = users
        .update_where(
            &Values::new().set("banned", true).set("password", SqlValue::Null),
            &Filter::new()
                .and("likes >", 3)
                .and("password IS", SqlValue::Null)
                .and("email", "a@b.c"),
        )
        .unwrap();

    assert_placeholders(&stmt);
    assert_eq!(
        stmt.params,
        vec![
            SqlValue::Bool(true),
            SqlValue::Null,
            stmt.params[2].clone(),
            SqlValue::Int(3),
            SqlValue::Text(String::from("a@b.c")),
        ]
    );
    assert!(stmt.params[2].as_timestamp().is_some());
}

#[test]
fn caller_input_never_reaches_sql_text() {
    let schema = schema();
    let users = builder(&schema, "users");
    let hostile = "'; DROP TABLE users; --";
    let stmt = users
        .select_one(&Filter::new().and("email", hostile))
        .unwrap();

    assert!(!stmt.sql.contains("DROP"));
    assert_eq!(stmt.params, vec![SqlValue::Text(String::from(hostile))]);
}

#[test]
fn delete_requires_primary_key() {
    let schema = schema();
    let notifications = builder(&schema, "notifications");
    let err = notifications
        .delete(&Values::new().set("text", "hi"))
        .unwrap_err();
    assert!(matches!(err, BuildError::MissingPrimaryKey { ref column, .. } if column == "id"));
}

#[test]
fn unknown_table_is_reported() {
    let schema = schema();
    let err = seaquel_core::StatementBuilder::for_table(&schema, "planets").unwrap_err();
    assert_eq!(err.to_string(), "unknown table: planets");
}
