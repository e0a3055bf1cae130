//! Ferry - minimal HTTP/1.1 file server
//!
//! Parses one request per connection and answers it from a small fixed set
//! of routes, including reading and writing files under a base directory.

pub mod config;
pub mod http;
pub mod routes;
pub mod server;
pub mod storage;
