//! Remote mode tests over the scripted remote session.

use pretty_assertions::assert_eq;
use qsh::engine::{MockFailure, MockRemote};
use qsh::error::TRANSPORT_ERROR_CODE;
use qsh::interpreter::Outcome;
use qsh::session::IGNORE_ERRORS;

use super::common::with_remote;

fn numbered(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("row {i}")).collect()
}

#[tokio::test]
async fn test_result_is_paged_in_full() {
    let lines = numbered(85);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let remote = MockRemote::new().on_lines("select * from big", &refs);
    let mut h = with_remote(&remote);

    let outcome = h.interp.process_line("select * from big;").await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), format!("{}\n", lines.join("\n")));
    assert_eq!(remote.fetch_calls(), 3);
    assert_eq!(remote.clean_calls(), 1);
}

#[tokio::test]
async fn test_every_statement_is_cleaned() {
    let remote = MockRemote::new()
        .on_lines("one", &["1"])
        .on_server_error("two", 40000, "SemanticException table not found");
    let mut h = with_remote(&remote);
    h.interp.session_mut().set_var(IGNORE_ERRORS, "true");

    let outcome = h.interp.process_line("one; two; three;").await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(remote.executed(), vec!["one", "two", "three"]);
    assert_eq!(remote.clean_calls(), 3);
    assert_eq!(
        h.err.contents(),
        "Server error: SemanticException table not found\n"
    );
}

#[tokio::test]
async fn test_server_code_stops_unit() {
    let remote = MockRemote::new().on_server_error("bad", 42, "denied");
    let mut h = with_remote(&remote);

    let outcome = h.interp.process_line("good; bad; never;").await;
    assert_eq!(outcome, Outcome::Code(42));
    assert_eq!(remote.executed(), vec!["good", "bad"]);
}

#[tokio::test]
async fn test_transport_failure_after_full_page() {
    let lines = numbered(40);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let remote = MockRemote::new().on_lines_then(
        "q",
        &refs,
        MockFailure::Transport("connection reset".to_string()),
    );
    let mut h = with_remote(&remote);

    let outcome = h.interp.process_line("q;").await;
    assert_eq!(outcome, Outcome::Code(TRANSPORT_ERROR_CODE));
    assert_eq!(h.out.contents().lines().count(), 40);
    assert_eq!(h.err.contents(), "Transport error: connection reset\n");
}

#[tokio::test]
async fn test_processor_tokens_go_to_the_server() {
    let remote = MockRemote::new();
    let mut h = with_remote(&remote);

    h.interp.process_line("set search_path=public;").await;
    assert_eq!(remote.executed(), vec!["set search_path=public"]);
}

#[tokio::test]
async fn test_builtins_stay_local() {
    let remote = MockRemote::new();
    let mut h = with_remote(&remote);

    assert_eq!(h.interp.process_line("list file;").await, Outcome::Code(0));
    assert_eq!(h.interp.process_line("quit;").await, Outcome::Exit(0));
    assert!(remote.executed().is_empty());
}

#[tokio::test]
async fn test_clean_failure_keeps_code() {
    let remote = MockRemote::new().on_lines("q", &["x"]).failing_clean();
    let mut h = with_remote(&remote);

    let outcome = h.interp.process_line("q;").await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "x\n");
    assert!(h.err.contents().starts_with("Transport error: "));
}
