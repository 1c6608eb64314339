//! End-to-end tests against real PostgreSQL clients.

mod common;

use std::net::SocketAddr;

use common::{Mode, MockBackend, init_tracing};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, SimpleQueryMessage};

async fn start_tokio(mode: Mode) -> SocketAddr {
    init_tracing();
    let server = zero_pgwire::tokio::Server::bind("postgres://127.0.0.1:0")
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve(move || MockBackend::new(mode)).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> tokio_postgres::Client {
    let config = format!("host={} port={} user=test dbname=test", addr.ip(), addr.port());
    let (client, connection) = tokio_postgres::connect(&config, NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

fn simple_rows(messages: &[SimpleQueryMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => row.get(0).map(str::to_string),
            _ => None,
        })
        .collect()
}

async fn exercise(client: &tokio_postgres::Client) {
    let messages = client.simple_query("SELECT SERIES 3").await.unwrap();
    assert_eq!(simple_rows(&messages), vec!["1", "2", "3"]);

    let rows = client.query("SELECT $1", &[&"hello"]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<_, &str>(0), "hello");

    let rows = client.query("SELECT SERIES 4", &[]).await.unwrap();
    let values: Vec<i32> = rows.iter().map(|row| row.get(0)).collect();
    assert_eq!(values, vec![1, 2, 3, 4]);

    let statement = client.prepare("SELECT $1").await.unwrap();
    for word in ["a", "b"] {
        let row = client.query_one(&statement, &[&word]).await.unwrap();
        assert_eq!(row.get::<_, &str>(0), word);
    }

    let err = client.simple_query("FAIL").await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::DIVISION_BY_ZERO));

    let err = client.query("BOGUS", &[]).await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::SYNTAX_ERROR));

    // Still usable after errors.
    let messages = client.simple_query("SELECT ok").await.unwrap();
    assert_eq!(simple_rows(&messages), vec!["ok"]);
}

#[tokio::test]
async fn tokio_postgres_inline() {
    let addr = start_tokio(Mode::Inline).await;
    let client = connect(addr).await;
    exercise(&client).await;
}

#[tokio::test]
async fn tokio_postgres_threaded_completion() {
    let addr = start_tokio(Mode::Threaded).await;
    let client = connect(addr).await;
    exercise(&client).await;
}

#[tokio::test]
async fn tokio_postgres_transaction() {
    let addr = start_tokio(Mode::Inline).await;
    let mut client = connect(addr).await;

    let transaction = client.transaction().await.unwrap();
    let err = transaction.simple_query("FAIL").await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::DIVISION_BY_ZERO));
    let err = transaction.simple_query("SELECT a").await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::IN_FAILED_SQL_TRANSACTION));
    transaction.rollback().await.unwrap();

    let messages = client.simple_query("SELECT a").await.unwrap();
    assert_eq!(simple_rows(&messages), vec!["a"]);
}

#[tokio::test]
async fn tokio_postgres_portal_batches() {
    let addr = start_tokio(Mode::Inline).await;
    let mut client = connect(addr).await;

    let transaction = client.transaction().await.unwrap();
    let statement = transaction.prepare("SELECT SERIES 5").await.unwrap();
    let portal = transaction.bind(&statement, &[]).await.unwrap();

    let mut batches = Vec::new();
    loop {
        let rows = transaction.query_portal(&portal, 2).await.unwrap();
        if rows.is_empty() {
            break;
        }
        batches.push(rows.iter().map(|row| row.get::<_, i32>(0)).collect::<Vec<_>>());
    }
    assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
    transaction.commit().await.unwrap();
}

#[test]
fn postgres_sync_client() {
    init_tracing();
    let server = zero_pgwire::sync::Server::bind("postgres://127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    std::thread::spawn(move || {
        let _ = server.serve(MockBackend::inline);
    });

    let config = format!("host={} port={} user=test", addr.ip(), addr.port());
    let mut client = postgres::Client::connect(&config, postgres::NoTls).unwrap();

    let rows = client.query("SELECT $1", &[&"sync"]).unwrap();
    assert_eq!(rows[0].get::<_, &str>(0), "sync");

    let messages = client.simple_query("SELECT SERIES 2").unwrap();
    let values: Vec<String> = messages
        .iter()
        .filter_map(|m| match m {
            postgres::SimpleQueryMessage::Row(row) => row.get(0).map(str::to_string),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec!["1", "2"]);

    client.close().unwrap();
}
