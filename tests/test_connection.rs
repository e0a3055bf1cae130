//! End-to-end tests: raw bytes in, raw bytes out.

use std::sync::Arc;
use std::time::Duration;

use ferry::http::connection::{Connection, Limits};
use ferry::routes::Router;
use ferry::server::listener::serve;
use ferry::storage::FileStore;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

fn start(dir: &TempDir, limits: Limits) -> (DuplexStream, JoinHandle<anyhow::Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let router = Arc::new(Router::new(FileStore::new(dir.path())));

    let task = tokio::spawn(async move {
        let mut conn = Connection::new(server, router, limits);
        conn.run().await
    });

    (client, task)
}

async fn exchange(dir: &TempDir, raw: &[u8]) -> Vec<u8> {
    let (mut client, task) = start(dir, Limits::default());

    client.write_all(raw).await.unwrap();
    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();

    task.await.unwrap().unwrap();
    response
}

#[tokio::test]
async fn test_echo_over_connection() {
    let dir = TempDir::new().unwrap();
    let response = exchange(&dir, b"GET /echo/abc HTTP/1.1\r\nHost: x\r\n\r\n").await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Length: 3\r\n"));
    assert!(text.ends_with("abc"));
}

#[tokio::test]
async fn test_index_over_connection() {
    let dir = TempDir::new().unwrap();
    let response = exchange(&dir, b"GET / HTTP/1.1\r\n\r\n").await;

    assert_eq!(response, b"HTTP/1.1 200 OK\r\n\r\n".to_vec());
}

#[tokio::test]
async fn test_malformed_request_gets_400() {
    let dir = TempDir::new().unwrap();
    let response = exchange(&dir, b"GARBAGE\r\n\r\n").await;

    assert_eq!(response, b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec());
}

#[tokio::test]
async fn test_bad_header_gets_400() {
    let dir = TempDir::new().unwrap();
    let response = exchange(&dir, b"GET / HTTP/1.1\r\nNoSeparator\r\n\r\n").await;

    assert_eq!(response, b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec());
}

#[tokio::test]
async fn test_invalid_content_length_gets_400() {
    let dir = TempDir::new().unwrap();
    let response = exchange(&dir, b"POST /files/a HTTP/1.1\r\nContent-Length: ten\r\n\r\n").await;

    assert_eq!(response, b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec());
}

#[tokio::test]
async fn test_body_split_across_writes() {
    let dir = TempDir::new().unwrap();
    let (mut client, task) = start(&dir, Limits::default());

    client
        .write_all(b"POST /files/split.txt HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"world").await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert!(response.starts_with(b"HTTP/1.1 201 Created\r\n"));
    assert!(response.ends_with(b"File created"));
    assert_eq!(std::fs::read(dir.path().join("split.txt")).unwrap(), b"helloworld");
}

#[tokio::test]
async fn test_body_beyond_first_kilobyte_is_kept() {
    let dir = TempDir::new().unwrap();
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

    let mut raw = format!(
        "POST /files/big.bin HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    )
    .into_bytes();
    raw.extend_from_slice(&payload);

    let response = exchange(&dir, &raw).await;
    assert!(response.starts_with(b"HTTP/1.1 201 Created\r\n"));

    let response = exchange(&dir, b"GET /files/big.bin HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with(&payload));
}

#[tokio::test]
async fn test_body_without_content_length_is_kept() {
    let dir = TempDir::new().unwrap();
    let response = exchange(&dir, b"POST /files/f HTTP/1.1\r\nHost: x\r\n\r\nhello").await;

    assert!(response.starts_with(b"HTTP/1.1 201 Created\r\n"));
    assert_eq!(std::fs::read(dir.path().join("f")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_short_body_then_eof_uses_what_arrived() {
    let dir = TempDir::new().unwrap();
    let (mut client, task) = start(&dir, Limits::default());

    client
        .write_all(b"POST /files/short HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
        .await
        .unwrap();
    client.shutdown().await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert!(response.starts_with(b"HTTP/1.1 201 Created\r\n"));
    assert_eq!(std::fs::read(dir.path().join("short")).unwrap(), b"abc");
}

#[tokio::test]
async fn test_overflowing_content_length_gets_413() {
    let dir = TempDir::new().unwrap();
    let raw = format!(
        "POST /files/huge HTTP/1.1\r\nContent-Length: {}\r\n\r\nx",
        usize::MAX
    );

    let response = exchange(&dir, raw.as_bytes()).await;

    assert_eq!(response, b"HTTP/1.1 413 Payload Too Large\r\n\r\n".to_vec());
    assert!(!dir.path().join("huge").exists());
}

#[tokio::test]
async fn test_head_terminator_split_across_writes() {
    let dir = TempDir::new().unwrap();
    let (mut client, task) = start(&dir, Limits::default());

    client.write_all(b"GET /echo/split HTTP/1.1\r\nHost: x\r\n\r").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"\n").await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with(b"split"));
}

#[tokio::test]
async fn test_partial_request_parsed_on_half_close() {
    let dir = TempDir::new().unwrap();
    let (mut client, task) = start(&dir, Limits::default());

    client.write_all(b"GET /echo/hi HTTP/1.1").await.unwrap();
    client.shutdown().await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with(b"hi"));
}

#[tokio::test]
async fn test_silent_close_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let (mut client, task) = start(&dir, Limits::default());

    client.shutdown().await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert!(response.is_empty());
}

#[tokio::test]
async fn test_oversized_request_gets_413() {
    let dir = TempDir::new().unwrap();
    let limits = Limits {
        max_request_bytes: 64,
        ..Limits::default()
    };
    let (mut client, task) = start(&dir, limits);

    client
        .write_all(b"POST /files/a HTTP/1.1\r\nContent-Length: 1000\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(response, b"HTTP/1.1 413 Payload Too Large\r\n\r\n".to_vec());
    assert!(!dir.path().join("a").exists());
}

#[tokio::test]
async fn test_idle_connection_times_out() {
    let dir = TempDir::new().unwrap();
    let limits = Limits {
        read_timeout: Duration::from_millis(50),
        ..Limits::default()
    };
    let (mut client, task) = start(&dir, limits);

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();

    assert!(response.is_empty());
}

#[tokio::test]
async fn test_listener_survives_bad_requests() {
    let dir = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Arc::new(Router::new(FileStore::new(dir.path())));
    let server = tokio::spawn(serve(listener, router, Limits::default()));

    async fn send(addr: std::net::SocketAddr, raw: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    let bad = send(addr, b"NONSENSE\r\n\r\n").await;
    assert!(bad.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));

    let (first, second) = tokio::join!(
        send(addr, b"GET /user-agent HTTP/1.1\r\nUser-Agent: one\r\n\r\n"),
        send(addr, b"GET /user-agent HTTP/1.1\r\nUser-Agent: two\r\n\r\n"),
    );
    assert!(first.ends_with(b"one"));
    assert!(second.ends_with(b"two"));

    server.abort();
}
