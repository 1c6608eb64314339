//! Simple query protocol replies.

mod common;

use common::{MockBackend, Reply, complete, error, interpreter, replies, row, run};
use zero_pgwire::TransactionStatus::{Failed, Idle, InTransaction};
use zero_pgwire::protocol::frontend::write_query;

fn query(sql: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    write_query(&mut buf, sql);
    buf
}

#[test]
fn rows_then_ready() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("SELECT SERIES 3"));
    assert_eq!(
        replies(&out),
        vec![
            Reply::RowDescription,
            row(&["1"]),
            row(&["2"]),
            row(&["3"]),
            complete("SELECT 3"),
            Reply::Ready(Idle),
        ]
    );
}

#[test]
fn multiple_statements() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("SELECT a; SET x = 1; SELECT b"));
    assert_eq!(
        replies(&out),
        vec![
            Reply::RowDescription,
            row(&["a"]),
            complete("SELECT 1"),
            complete("SET"),
            Reply::RowDescription,
            row(&["b"]),
            complete("SELECT 1"),
            Reply::Ready(Idle),
        ]
    );
    // Submitted as one unit.
    assert_eq!(backend.executed().len(), 1);
}

#[test]
fn empty_query() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    for sql in ["", "   ", ";", " ; ;"] {
        let out = run(&mut interp, &mut backend, &query(sql));
        assert_eq!(
            replies(&out),
            vec![Reply::EmptyQuery, Reply::Ready(Idle)],
            "{sql:?}"
        );
    }
    assert!(backend.executed().is_empty());
}

#[test]
fn empty_payload() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    // 'Q' with no payload at all
    let out = run(&mut interp, &mut backend, &[b'Q', 0, 0, 0, 4]);
    assert_eq!(replies(&out), vec![Reply::EmptyQuery, Reply::Ready(Idle)]);
}

#[test]
fn error_reports_then_ready() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("FAIL"));
    assert_eq!(replies(&out), vec![error("22012"), Reply::Ready(Idle)]);

    // The connection keeps working.
    let out = run(&mut interp, &mut backend, &query("SELECT ok"));
    assert_eq!(replies(&out).last(), Some(&Reply::Ready(Idle)));
}

#[test]
fn error_after_partial_results() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("SELECT a; FAIL; SELECT b"));
    assert_eq!(
        replies(&out),
        vec![
            Reply::RowDescription,
            row(&["a"]),
            complete("SELECT 1"),
            error("22012"),
            Reply::Ready(Idle),
        ]
    );
}

#[test]
fn failed_transaction_block() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("BEGIN"));
    assert_eq!(replies(&out), vec![complete("BEGIN"), Reply::Ready(InTransaction)]);

    let out = run(&mut interp, &mut backend, &query("FAIL"));
    assert_eq!(replies(&out), vec![error("22012"), Reply::Ready(Failed)]);

    let out = run(&mut interp, &mut backend, &query("SELECT a"));
    assert_eq!(replies(&out), vec![error("25P02"), Reply::Ready(Failed)]);

    let out = run(&mut interp, &mut backend, &query("ROLLBACK"));
    assert_eq!(replies(&out), vec![complete("ROLLBACK"), Reply::Ready(Idle)]);

    // "SELECT a" never reached the backend.
    assert_eq!(backend.executed(), vec!["BEGIN", "FAIL", "ROLLBACK"]);
}

#[test]
fn start_transaction_opens_block() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("START TRANSACTION ISOLATION LEVEL SERIALIZABLE"));
    assert_eq!(
        replies(&out),
        vec![complete("START TRANSACTION"), Reply::Ready(InTransaction)]
    );

    let out = run(&mut interp, &mut backend, &query("COMMIT"));
    assert_eq!(replies(&out), vec![complete("COMMIT"), Reply::Ready(Idle)]);
}

#[test]
fn transaction_opened_mid_query() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let out = run(&mut interp, &mut backend, &query("SELECT a; BEGIN; SELECT b"));
    assert_eq!(replies(&out).last(), Some(&Reply::Ready(InTransaction)));

    let out = run(&mut interp, &mut backend, &query("COMMIT"));
    assert_eq!(replies(&out), vec![complete("COMMIT"), Reply::Ready(Idle)]);
}

#[test]
fn pipelined_queries() {
    let mut backend = MockBackend::inline();
    let mut interp = interpreter();

    let mut input = query("SELECT a");
    input.extend(query("FAIL"));
    input.extend(query("SELECT b"));
    let out = run(&mut interp, &mut backend, &input);
    assert_eq!(
        replies(&out),
        vec![
            Reply::RowDescription,
            row(&["a"]),
            complete("SELECT 1"),
            Reply::Ready(Idle),
            error("22012"),
            Reply::Ready(Idle),
            Reply::RowDescription,
            row(&["b"]),
            complete("SELECT 1"),
            Reply::Ready(Idle),
        ]
    );
}
