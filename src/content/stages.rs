//! Post-read pipeline stages.

use std::io::Write;
use std::time::SystemTime;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::content::{mime, ContentError, Delivery, Resource};

/// One transformation applied after the resource has been read.
pub trait ContentStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, delivery: &mut Delivery) -> Result<(), ContentError>;

    /// Bytes to deliver instead when an earlier step failed.
    fn on_error(&self, _resource_id: &str, _error: &ContentError) -> Option<Vec<u8>> {
        None
    }
}

/// Gzip the whole payload of a file.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompressStage;

impl ContentStage for CompressStage {
    fn name(&self) -> &'static str {
        "compress"
    }

    fn apply(&self, delivery: &mut Delivery) -> Result<(), ContentError> {
        if !matches!(delivery.resource, Resource::File(_)) {
            return Ok(());
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&delivery.payload.bytes).map_err(ContentError::Compress)?;
        delivery.payload.bytes = encoder.finish().map_err(ContentError::Compress)?;
        delivery.payload.encoding = Some("gzip");
        Ok(())
    }
}

/// Prepend the HTTP status line and headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebHeaderStage;

impl WebHeaderStage {
    fn plain(status: &str, body: String) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body.as_bytes());
        out
    }
}

impl ContentStage for WebHeaderStage {
    fn name(&self) -> &'static str {
        "web-header"
    }

    fn apply(&self, delivery: &mut Delivery) -> Result<(), ContentError> {
        let id = &delivery.resource_id;
        let response = match &delivery.resource {
            Resource::File(path) => {
                let modified = delivery.modified.unwrap_or_else(SystemTime::now);
                let mut head = format!(
                    "HTTP/1.1 200 OK\r\n\
                     Date: {}\r\n\
                     Content-Length: {}\r\n\
                     Content-Type: {}\r\n\
                     Last-Modified: {}\r\n",
                    httpdate::fmt_http_date(SystemTime::now()),
                    delivery.payload.bytes.len(),
                    mime::content_type(path),
                    httpdate::fmt_http_date(modified),
                );
                if let Some(encoding) = delivery.payload.encoding {
                    head.push_str(&format!("Content-Encoding: {encoding}\r\n"));
                }
                head.push_str("\r\n");

                let mut out = head.into_bytes();
                out.extend_from_slice(&delivery.payload.bytes);
                out
            }
            Resource::Missing(_) => Self::plain(
                "404 File not found",
                format!("Error 404 File Not Found\r\nResource not available: {id}"),
            ),
            Resource::Directory(_) => Self::plain(
                "403 Forbidden",
                "Error 403 Forbidden\r\nResource is a directory, access denied".to_string(),
            ),
            Resource::Forbidden => Self::plain(
                "403 Forbidden",
                "Error 403 Forbidden\r\nResource is outside the public folder, access denied".to_string(),
            ),
        };

        delivery.payload.bytes = response;
        delivery.payload.encoding = None;
        Ok(())
    }

    fn on_error(&self, resource_id: &str, _error: &ContentError) -> Option<Vec<u8>> {
        Some(Self::plain(
            "500 Server error",
            format!("Resource is available: {resource_id} but server encountered an internal error"),
        ))
    }
}
