//! End-to-end tests against the in-memory SQLite engine.

use pretty_assertions::assert_eq;
use qsh::engine::{COMPILE_ERROR_CODE, EXECUTION_ERROR_CODE};
use qsh::interpreter::Outcome;

use super::common::{with_sqlite, Harness};

async fn seeded() -> Harness {
    let mut h = with_sqlite().await;
    let outcome = h
        .interp
        .process_line(
            "create table logs (city integer, msg text);\n\
             insert into logs values (1, 'a'), (1, 'b'), (2, 'c');",
        )
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    h
}

#[tokio::test]
async fn test_rows_are_printed_tab_separated() {
    let mut h = seeded().await;

    let outcome = h
        .interp
        .process_line("select city, msg from logs order by msg;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "1\ta\n1\tb\n2\tc\n");
    assert!(h.err.contents().is_empty());
}

#[tokio::test]
async fn test_header_follows_session_variable() {
    let mut h = seeded().await;

    h.interp
        .process_line("set cli.print.header=true; select count(*) as n from logs;")
        .await;
    assert_eq!(h.out.contents(), "n\n3\n");
}

#[tokio::test]
async fn test_compile_error_stops_unit() {
    let mut h = seeded().await;

    let outcome = h
        .interp
        .process_line("select * from nope; select 1;")
        .await;
    assert_eq!(outcome, Outcome::Code(COMPILE_ERROR_CODE));
    assert!(h.out.contents().is_empty());
    assert!(h.err.contents().starts_with("Query error: "));
    assert!(h.err.contents().contains("no such table"));
}

#[tokio::test]
async fn test_execution_error_code() {
    let mut h = with_sqlite().await;

    let outcome = h
        .interp
        .process_line(
            "create table u (id integer primary key);\n\
             insert into u values (1);\n\
             insert into u values (1);",
        )
        .await;
    assert_eq!(outcome, Outcome::Code(EXECUTION_ERROR_CODE));
}

#[tokio::test]
async fn test_source_script_builds_state() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("schema.sql");
    std::fs::write(
        &script,
        "create table kv (k text, v text);\ninsert into kv values ('x', 'semi\\;colon');\n",
    )
    .unwrap();
    let mut h = with_sqlite().await;

    let outcome = h
        .interp
        .process_line(&format!("source {};\nselect v from kv;", script.display()))
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "semi;colon\n");
}

#[tokio::test]
async fn test_bias_on_builds_sample_tables() {
    let dir = tempfile::tempdir().unwrap();
    let summary = dir.path().join("keys.dat");
    let mut h = seeded().await;
    h.interp.session_mut().key_summary_file = summary.clone();

    let outcome = h
        .interp
        .process_line("set sampling.enabled=true;\nselect * from logs bias on city limit=10;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));

    let mut keys: Vec<String> = std::fs::read_to_string(&summary)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["1\t2", "2\t1"]);

    let out = h.out.contents();
    assert!(out.contains("CREATE TABLE qsh_sample_logs_10_city_1 AS select * from logs  where city = 1"));
    assert!(out.contains("DROP TABLE qsh_sample_logs_10_city_2"));

    let outcome = h
        .interp
        .process_line(
            "select count(*) from qsh_sample_logs_10_city_1;\n\
             select count(*) from qsh_sample_logs_10_city_2;",
        )
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert!(h.out.contents().ends_with("2\n1\n"));
}

#[tokio::test]
async fn test_bias_on_is_plain_sql_when_disabled() {
    let mut h = seeded().await;

    let outcome = h
        .interp
        .process_line("select * from logs bias on city limit=10;")
        .await;
    assert_eq!(outcome, Outcome::Code(COMPILE_ERROR_CODE));
}

#[tokio::test]
async fn test_sql_delete_changes_row_count() {
    let mut h = seeded().await;

    let outcome = h
        .interp
        .process_line("delete from logs where city = 1; select count(*) from logs;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "1\n");
    assert!(h.err.contents().is_empty());
}
