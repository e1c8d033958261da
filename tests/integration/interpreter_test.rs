//! Statement pipeline tests over the mock local engine.
//!
//! Covers splitting, routing, the error policy across sourced files and
//! the administrative processors, as seen from whole input units.

use pretty_assertions::assert_eq;
use qsh::engine::{MockEngine, MockResult};
use qsh::interpreter::Outcome;
use qsh::session::IGNORE_ERRORS;

use super::common::with_mock;

#[tokio::test]
async fn test_escaped_terminator_reaches_engine() {
    let engine = MockEngine::new().on("select 'a;b'", MockResult::rows(&["c"], &["a;b"]));
    let mut h = with_mock(&engine);

    let outcome = h.interp.process_line("select 'a\\;b';\nselect 2;").await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(engine.executed(), vec!["select 'a;b'", "select 2"]);
    assert_eq!(h.out.contents(), "a;b\n");
}

#[tokio::test]
async fn test_multi_line_statement_is_one_statement() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    h.interp
        .process_line("select a,\n       b\n  from t\n;")
        .await;
    assert_eq!(engine.executed(), vec!["select a,\n       b\n  from t"]);
}

#[tokio::test]
async fn test_code_of_last_statement_is_returned() {
    let engine = MockEngine::new().on("last", MockResult::failure(12, "boom"));
    let mut h = with_mock(&engine);
    h.interp.session_mut().set_var(IGNORE_ERRORS, "true");

    let outcome = h.interp.process_line("first; last;").await;
    assert_eq!(outcome, Outcome::Code(12));
    assert_eq!(h.err.contents(), "Query error: boom\n");
}

#[tokio::test]
async fn test_nested_sources_share_error_policy() {
    let dir = tempfile::tempdir().unwrap();
    let inner = dir.path().join("inner.sql");
    let outer = dir.path().join("outer.sql");
    std::fs::write(&inner, "inner_ok;\ninner_bad;\ninner_after;\n").unwrap();
    std::fs::write(
        &outer,
        format!("outer_before;\nsource {};\nouter_after;\n", inner.display()),
    )
    .unwrap();

    let engine = MockEngine::new().on("inner_bad", MockResult::failure(10, "bad"));
    let mut h = with_mock(&engine);
    let outcome = h
        .interp
        .process_line(&format!("source {}; top_after;", outer.display()))
        .await;
    assert_eq!(outcome, Outcome::Code(10));
    assert_eq!(
        engine.executed(),
        vec!["outer_before", "inner_ok", "inner_bad"]
    );

    let engine = MockEngine::new().on("inner_bad", MockResult::failure(10, "bad"));
    let mut h = with_mock(&engine);
    h.interp.session_mut().set_var(IGNORE_ERRORS, "true");
    let outcome = h
        .interp
        .process_line(&format!("source {}; top_after;", outer.display()))
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(
        engine.executed(),
        vec![
            "outer_before",
            "inner_ok",
            "inner_bad",
            "inner_after",
            "outer_after",
            "top_after"
        ]
    );
}

#[tokio::test]
async fn test_quit_inside_sourced_file_exits() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bye.sql");
    std::fs::write(&script, "one;\nexit;\ntwo;\n").unwrap();
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h
        .interp
        .process_line(&format!("source {}; three;", script.display()))
        .await;
    assert_eq!(outcome, Outcome::Exit(0));
    assert_eq!(engine.executed(), vec!["one"]);
}

#[tokio::test]
async fn test_set_then_list_variables() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h
        .interp
        .process_line("set b.key=2; SET a.key=1; set a.key; set missing;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "a.key=1\nmissing is undefined\n");
    assert!(engine.executed().is_empty());
}

#[tokio::test]
async fn test_add_list_delete_resources() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");
    std::fs::write(&first, "1").unwrap();
    std::fs::write(&second, "2").unwrap();
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let text = format!(
        "add file {} {}; list file;",
        first.display(),
        second.display()
    );
    assert_eq!(h.interp.process_line(&text).await, Outcome::Code(0));
    assert_eq!(
        h.out.contents(),
        format!("{}\n{}\n", first.display(), second.display())
    );

    let text = format!("delete file {}; list files;", first.display());
    assert_eq!(h.interp.process_line(&text).await, Outcome::Code(0));
    assert!(h.out.contents().ends_with(&format!("{}\n", second.display())));

    assert_eq!(h.interp.process_line("list jar;").await, Outcome::Code(0));
    assert!(engine.executed().is_empty());
}

#[tokio::test]
async fn test_add_missing_path_fails() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h
        .interp
        .process_line("add jar /no/such/lib.jar; list jar;")
        .await;
    assert_eq!(outcome, Outcome::Code(1));
    assert!(h.err.contents().contains("/no/such/lib.jar does not exist"));
    assert!(h.out.contents().is_empty());
}

#[tokio::test]
async fn test_blank_input_is_a_no_op() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    assert_eq!(h.interp.process_line("  ;\n;  ").await, Outcome::Code(0));
    assert!(engine.executed().is_empty());
}
