use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::http::parser::{Framing, ParseError, find_headers_end, framing_at, parse_request};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::routes::Router;

const READ_CHUNK: usize = 1024;

/// Per-connection bounds on time and request size.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_request_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_request_bytes: 1024 * 1024,
        }
    }
}

/// One client connection: a single request, a single response, then close.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    /// Set once the head has fully arrived.
    framing: Option<Framing>,
    /// Prefix of `buffer` already searched for the end of the head.
    scanned: usize,
    router: Arc<Router>,
    limits: Limits,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Rejected(StatusCode),
    Writing(ResponseWriter),
    Closed,
}

/// What the read phase produced.
enum Incoming {
    Request(Request),
    Rejected(StatusCode),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, router: Arc<Router>, limits: Limits) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            framing: None,
            scanned: 0,
            router,
            limits,
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        Incoming::Request(req) => ConnectionState::Processing(req),
                        Incoming::Rejected(status) => ConnectionState::Rejected(status),
                        Incoming::Closed => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(req) => {
                    let response = self.router.route(&req).await;

                    tracing::info!(
                        method = %req.method,
                        uri = %req.uri,
                        status = response.status.as_u16(),
                        bytes = response.body_bytes().len(),
                        "request handled"
                    );

                    self.state = ConnectionState::Writing(ResponseWriter::new(&response));
                }

                ConnectionState::Rejected(status) => {
                    tracing::info!(status = status.as_u16(), "request rejected");
                    self.state = ConnectionState::Writing(ResponseWriter::new(&Response::empty(status)));
                }

                ConnectionState::Writing(mut writer) => {
                    timeout(self.limits.write_timeout, writer.write_to_stream(&mut self.stream))
                        .await
                        .context("timed out writing response")??;

                    // No keep-alive: one response per connection.
                    if let Err(e) = self.stream.shutdown().await {
                        tracing::debug!(error = %e, "shutdown after response failed");
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads until the head and any declared body have arrived.
    ///
    /// Without a `Content-Length` the body is whatever arrived along with the
    /// head. If the peer stops sending early (EOF or read timeout) whatever
    /// arrived is parsed as is. A connection that sent nothing closes silently.
    async fn read_request(&mut self) -> anyhow::Result<Incoming> {
        loop {
            let framing = match self.scan_head() {
                Ok(framing) => framing,
                Err(e) => {
                    tracing::debug!(error = %e, "bad request framing");
                    return Ok(Incoming::Rejected(StatusCode::BadRequest));
                }
            };

            if let Some(framing) = framing {
                let Some(total) = framing
                    .total()
                    .filter(|total| *total <= self.limits.max_request_bytes)
                else {
                    return Ok(Incoming::Rejected(StatusCode::PayloadTooLarge));
                };

                if framing.content_length.is_none() {
                    let len = self.buffer.len();
                    return Ok(self.take_request(len));
                }
                if self.buffer.len() >= total {
                    return Ok(self.take_request(total));
                }
            }

            if self.buffer.len() >= self.limits.max_request_bytes {
                return Ok(Incoming::Rejected(StatusCode::PayloadTooLarge));
            }

            self.buffer.reserve(READ_CHUNK);

            let n = match timeout(self.limits.read_timeout, self.stream.read_buf(&mut self.buffer)).await {
                Ok(read) => read.context("failed to read request")?,
                Err(_) if self.buffer.is_empty() => {
                    tracing::warn!("timed out waiting for request");
                    return Ok(Incoming::Closed);
                }
                Err(_) => {
                    tracing::debug!(buffered = self.buffer.len(), "read timed out, using partial request");
                    0
                }
            };

            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(Incoming::Closed);
                }

                let len = self.buffer.len();
                return Ok(self.take_request(len));
            }
        }
    }

    /// Looks for the end of the head in bytes not searched yet.
    ///
    /// The result is cached, so the head is only inspected once.
    fn scan_head(&mut self) -> Result<Option<Framing>, ParseError> {
        if self.framing.is_some() {
            return Ok(self.framing);
        }

        // Back up far enough to catch a terminator split across reads.
        let start = self.scanned.saturating_sub(3);
        self.scanned = self.buffer.len();

        let Some(pos) = find_headers_end(&self.buffer[start..]) else {
            return Ok(None);
        };

        self.framing = Some(framing_at(&self.buffer, start + pos)?);
        Ok(self.framing)
    }

    fn take_request(&mut self, len: usize) -> Incoming {
        let raw = self.buffer.split_to(len);

        match parse_request(&raw) {
            Ok(req) => Incoming::Request(req),
            Err(e) => {
                tracing::debug!(error = %e, "malformed request");
                Incoming::Rejected(StatusCode::BadRequest)
            }
        }
    }
}
