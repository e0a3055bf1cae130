use crate::http::request::{Method, Request};
use std::collections::HashMap;
use thiserror::Error;

const LINE_END: &[u8] = b"\r\n";
const HEADERS_END: &[u8] = b"\r\n\r\n";

/// Reasons a raw buffer could not be turned into a [`Request`].
///
/// Every variant answers the client with `400 Bad Request`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("request is empty")]
    EmptyRequest,
    #[error("request line is not `METHOD TARGET VERSION`")]
    InvalidRequestLine,
    #[error("header line has no `: ` separator")]
    InvalidHeader,
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,
    #[error("Content-Length is not a number")]
    InvalidContentLength,
}

/// Iterates over `\r\n` separated lines of a byte buffer.
///
/// A bare `\n` is ordinary data. The remainder after any line can be taken
/// untouched with [`Lines::rest`], which keeps binary bodies intact.
struct Lines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Lines<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { rest: Some(buf) }
    }

    fn rest(&self) -> &'a [u8] {
        self.rest.unwrap_or(&[])
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let buf = self.rest.take()?;
        match find(buf, LINE_END) {
            Some(pos) => {
                self.rest = Some(&buf[pos + LINE_END.len()..]);
                Some(&buf[..pos])
            }
            None => Some(buf),
        }
    }
}

/// Parses one request out of `buf`.
///
/// The first line must hold three space separated tokens. Following lines
/// are headers up to the first empty line; whatever comes after that empty
/// line is the body. Without an empty line the request has no body.
pub fn parse_request(buf: &[u8]) -> Result<Request, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::EmptyRequest);
    }

    let mut lines = Lines::new(buf);

    // Request line
    let request_line = lines.next().ok_or(ParseError::EmptyRequest)?;
    let (method, uri, protocol) = split_request_line(utf8(request_line)?)?;

    // Headers
    let mut headers = HashMap::new();
    let mut body = None;

    while let Some(line) = lines.next() {
        if line.is_empty() {
            body = Some(lines.rest().to_vec());
            break;
        }

        let (key, value) = utf8(line)?
            .split_once(": ")
            .ok_or(ParseError::InvalidHeader)?;

        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }

        headers.insert(key.to_string(), value.to_string());
    }

    Ok(Request {
        method: Method::parse(method),
        uri: uri.to_string(),
        protocol: protocol.to_string(),
        headers,
        body,
    })
}

/// Splits on the first two spaces only; the protocol is the rest of the line.
fn split_request_line(line: &str) -> Result<(&str, &str, &str), ParseError> {
    let mut parts = line.splitn(3, ' ');

    let method = parts.next().unwrap_or_default();
    let uri = parts.next().unwrap_or_default();
    let protocol = parts.next().unwrap_or_default();

    if method.is_empty() || uri.is_empty() || protocol.is_empty() || protocol.contains(' ') {
        return Err(ParseError::InvalidRequestLine);
    }

    Ok((method, uri, protocol))
}

fn utf8(line: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(line).map_err(|_| ParseError::InvalidEncoding)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset of the `\r\n\r\n` that closes the header block, if it arrived yet.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    find(buf, HEADERS_END)
}

/// Where a request head ends and how much body it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Length of the request line and headers, blank line included.
    pub head_len: usize,
    /// Declared `Content-Length`, if the head carries one.
    pub content_length: Option<usize>,
}

impl Framing {
    /// Bytes the whole request spans, or `None` if that overflows `usize`.
    pub fn total(&self) -> Option<usize> {
        self.head_len.checked_add(self.content_length.unwrap_or(0))
    }
}

/// Framing of the request in `buf`, or `Ok(None)` while the head is incomplete.
pub fn framing(buf: &[u8]) -> Result<Option<Framing>, ParseError> {
    find_headers_end(buf)
        .map(|headers_end| framing_at(buf, headers_end))
        .transpose()
}

/// Framing for a head whose `\r\n\r\n` starts at `headers_end`.
///
/// The header name is matched case-insensitively here since this only frames
/// the read; routing still sees headers exactly as sent.
pub fn framing_at(buf: &[u8], headers_end: usize) -> Result<Framing, ParseError> {
    let head = String::from_utf8_lossy(&buf[..headers_end]);

    let content_length = head
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case("Content-Length"))
        .last()
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)
        })
        .transpose()?;

    Ok(Framing {
        head_len: headers_end + HEADERS_END.len(),
        content_length,
    })
}
