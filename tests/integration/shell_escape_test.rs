//! Shell escape tests through the interpreter.

#![cfg(unix)]

use pretty_assertions::assert_eq;
use qsh::engine::MockEngine;
use qsh::interpreter::Outcome;

use super::common::with_mock;

#[tokio::test]
async fn test_output_is_copied_in_order_with_queries() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h
        .interp
        .process_line("!echo first; !echo second >&2; !echo third;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "first\nthird\n");
    assert_eq!(h.err.contents(), "second\n");
    assert!(engine.executed().is_empty());
}

#[tokio::test]
async fn test_exit_status_is_the_code() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h.interp.process_line("!exit 4; select 1;").await;
    assert_eq!(outcome, Outcome::Code(4));
    assert_eq!(
        h.err.contents(),
        "Shell command error: Command failed with exit code = 4\n"
    );
    assert!(engine.executed().is_empty());
}

#[tokio::test]
async fn test_escaped_terminator_reaches_the_shell() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h.interp.process_line("!echo a\\; echo b;").await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents(), "a\nb\n");
}

#[tokio::test]
async fn test_large_output_does_not_block() {
    let engine = MockEngine::new();
    let mut h = with_mock(&engine);

    let outcome = h
        .interp
        .process_line("!seq 1 50000; !seq 1 50000 >&2;")
        .await;
    assert_eq!(outcome, Outcome::Code(0));
    assert_eq!(h.out.contents().lines().count(), 50000);
    assert_eq!(h.err.contents().lines().count(), 50000);
}
