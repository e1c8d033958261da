//! Remote mode tests against a live PostgreSQL server.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use pretty_assertions::assert_eq;
use qsh::config::ConnectionConfig;
use qsh::engine::{Backend, PostgresSession};
use qsh::interpreter::{Interpreter, Outcome};
use qsh::session::{ExecutionMode, Session, SharedBuffer};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to build an interpreter on a live session.
async fn get_test_shell() -> Option<(Interpreter, SharedBuffer, SharedBuffer)> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    let remote = PostgresSession::connect(&config).await.ok()?;

    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let mode = ExecutionMode::Remote {
        host: remote.host().to_string(),
        port: remote.port(),
    };
    let mut session = Session::new(mode, out.sink(), err.sink());
    session.silent = true;
    let interp = Interpreter::new(session, Backend::Remote(Box::new(remote)));
    Some((interp, out, err))
}

#[tokio::test]
async fn test_cursor_pages_whole_result() {
    let Some((mut interp, out, _)) = get_test_shell().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = interp
        .process_line("SELECT g, 'v' || g FROM generate_series(1, 95) AS g;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));

    let lines: Vec<String> = out.contents().lines().map(String::from).collect();
    assert_eq!(lines.len(), 95);
    assert_eq!(lines[0], "1\tv1");
    assert_eq!(lines[94], "95\tv95");
}

#[tokio::test]
async fn test_null_rendering() {
    let Some((mut interp, out, _)) = get_test_shell().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    interp.process_line("SELECT NULL::int, 'x';").await;
    assert_eq!(out.contents(), "NULL\tx\n");
}

#[tokio::test]
async fn test_server_error_uses_sqlstate_class() {
    let Some((mut interp, _, err)) = get_test_shell().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = interp
        .process_line("SELECT * FROM qsh_table_that_does_not_exist;")
        .await;
    assert_eq!(outcome, Outcome::Code(42));
    assert!(err.contents().starts_with("Server error: "));

    // The session stays usable after a failed statement.
    assert_eq!(interp.process_line("SELECT 1;").await, Outcome::Code(0));
}

#[tokio::test]
async fn test_user_transaction_spans_statements() {
    let Some((mut interp, out, _)) = get_test_shell().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = interp
        .process_line(
            "BEGIN;\n\
             CREATE TEMP TABLE qsh_tx (a int) ON COMMIT DROP;\n\
             INSERT INTO qsh_tx VALUES (1), (2);\n\
             SELECT sum(a) FROM qsh_tx;\n\
             SELECT count(*) FROM qsh_tx;\n\
             COMMIT;",
        )
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(out.contents(), "3\n2\n");
}
