//! HTTP protocol implementation.
//!
//! A deliberately small HTTP/1.1 subset: one request per connection, no
//! keep-alive, no chunked encoding.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine driving read, route and write
//! - **`parser`**: Turns raw bytes into a [`request::Request`]
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes responses and writes them to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Read until head + Content-Length arrived
//!        └──────┬──────┘
//!               │ Request parsed          │ Malformed / too large
//!               ▼                         ▼
//!        ┌──────────────────┐      ┌──────────────┐
//!        │   Processing     │      │   Rejected   │ ← 400 / 413
//!        └──────┬───────────┘      └──────┬───────┘
//!               │ Response ready          │
//!               ▼                         │
//!        ┌──────────────────┐             │
//!        │    Writing       │ ◄───────────┘
//!        └──────┬───────────┘
//!               │ Response sent
//!               ▼
//!            Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ferry::http::connection::{Connection, Limits};
//! use ferry::routes::Router;
//! use ferry::storage::FileStore;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:4221").await?;
//!     let router = Arc::new(Router::new(FileStore::new(".")));
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let router = router.clone();
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, router, Limits::default());
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod request;
pub mod response;
pub mod parser;
pub mod connection;
pub mod writer;
