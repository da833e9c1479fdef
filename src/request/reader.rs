//! HTTP request framing.
//!
//! # Responsibilities
//! - Read header lines up to the blank terminator line
//! - Detect `Content-Length` and read exactly that many body bytes
//! - Split the body into `&`-separated parameters (no URL decoding)
//! - Answer header and parameter lookups
//!
//! # Design Decisions
//! - A closed stream is not an error: whatever was read is kept
//! - An unparsable `Content-Length` means an empty body, never a failure
//! - Header bytes are capped so a client cannot stream one endless line
//! - Header lookup is a case-insensitive substring match, value after the last `:`

use std::collections::HashMap;
use std::sync::OnceLock;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Prefix identifying the body length header. Matched case-sensitively.
const CONTENT_LENGTH_PREFIX: &str = "Content-Length:";

/// Upper bound on the bytes of all header lines, terminators included.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Header carrying the client handshake key of a WebSocket upgrade.
pub const WEBSOCKET_KEY_HEADER: &str = "sec-websocket-key";

/// Errors raised while framing a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("failed to read request: {0}")]
    Io(#[from] std::io::Error),

    #[error("request headers exceed limit of {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("request body of {size} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { size: usize, limit: usize },
}

/// A request as read off the wire.
#[derive(Debug, Default)]
pub struct ParsedRequest {
    headers: Vec<String>,
    params: Vec<String>,
    values: OnceLock<HashMap<String, String>>,
}

impl ParsedRequest {
    /// Build a request from already-split header lines and body parameters.
    pub fn new(headers: Vec<String>, params: Vec<String>) -> Self {
        Self {
            headers,
            params,
            values: OnceLock::new(),
        }
    }

    /// Header lines in wire order, without the blank terminator.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Body parameters in wire order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The request line, or an empty string when no header was received.
    pub fn first_line(&self) -> &str {
        self.headers.first().map(String::as_str).unwrap_or("")
    }

    /// Method token of the request line (`GET`, `POST`, ...).
    pub fn method(&self) -> &str {
        self.first_line().split(' ').next().unwrap_or("")
    }

    /// Request target with its leading `/` removed.
    ///
    /// `GET /css/site.css HTTP/1.1` yields `css/site.css`; `GET / HTTP/1.1`
    /// yields an empty string.
    pub fn resource(&self) -> &str {
        let target = self.first_line().split(' ').nth(1).unwrap_or("");
        target.strip_prefix('/').unwrap_or(target)
    }

    /// Look up a header by case-insensitive substring match on the whole line.
    ///
    /// Returns the text after the last `:` of the first matching line, trimmed.
    pub fn header_line(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.headers
            .iter()
            .find(|line| line.to_lowercase().contains(&key))
            .map(|line| match line.rfind(':') {
                Some(idx) => line[idx + 1..].trim(),
                None => line.trim(),
            })
    }

    /// The client's handshake key when the request asks for a WebSocket upgrade.
    pub fn websocket_key(&self) -> Option<&str> {
        self.header_line(WEBSOCKET_KEY_HEADER).filter(|key| !key.is_empty())
    }

    /// Value of a body parameter. The last occurrence of a key wins.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.values
            .get_or_init(|| {
                self.params
                    .iter()
                    .map(|param| match param.split_once('=') {
                        Some((k, v)) => (k.to_string(), v.to_string()),
                        None => (param.clone(), String::new()),
                    })
                    .collect()
            })
            .get(key)
            .map(String::as_str)
    }
}

/// Read one request from the stream.
///
/// `max_body_size` bounds the `Content-Length` the reader is willing to honor.
/// Header lines together may not exceed [`MAX_HEADER_BYTES`].
pub async fn read_request<R>(reader: &mut R, max_body_size: usize) -> Result<ParsedRequest, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();
    let mut content_length = 0usize;
    let mut raw = Vec::new();
    let mut header_bytes = 0usize;

    loop {
        raw.clear();
        // One byte past the budget is enough to detect an overflow.
        let budget = (MAX_HEADER_BYTES - header_bytes + 1) as u64;
        let read = (&mut *reader).take(budget).read_until(b'\n', &mut raw).await?;
        if read == 0 {
            tracing::debug!(lines = headers.len(), "Stream closed before end of headers");
            return Ok(ParsedRequest::new(headers, Vec::new()));
        }
        header_bytes += read;
        if header_bytes > MAX_HEADER_BYTES {
            return Err(RequestError::HeadersTooLarge {
                limit: MAX_HEADER_BYTES,
            });
        }

        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }

        if let Some(value) = line.strip_prefix(CONTENT_LENGTH_PREFIX) {
            content_length = match value.trim().parse() {
                Ok(len) => len,
                Err(e) => {
                    tracing::warn!(header = %line, error = %e, "Content-Length not parsable, assuming empty body");
                    0
                }
            };
        }
        headers.push(line.to_string());
    }

    if content_length > max_body_size {
        return Err(RequestError::BodyTooLarge {
            size: content_length,
            limit: max_body_size,
        });
    }

    let params = if content_length > 0 {
        let mut body = Vec::with_capacity(content_length);
        let read = (&mut *reader).take(content_length as u64).read_to_end(&mut body).await?;
        if read < content_length {
            tracing::warn!(expected = content_length, read, "Stream closed before end of body");
        }
        split_params(&body)
    } else {
        Vec::new()
    };

    Ok(ParsedRequest::new(headers, params))
}

/// Split a body on top-level `&`.
fn split_params(body: &[u8]) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    String::from_utf8_lossy(body).split('&').map(str::to_string).collect()
}
