//! Request framing subsystem.
//!
//! # Data Flow
//! ```text
//! Raw client bytes
//!     → reader.rs (header lines, Content-Length, body parameters)
//!     → ParsedRequest
//!     → filters, then WebSocket upgrade or the HTTP chain
//! ```
//!
//! `handler.rs` holds the contract every per-port plugin implements.

pub mod encoding;
pub mod handler;
pub mod reader;

pub use handler::{flag, InitConfig, InitError, RequestHandler};
pub use reader::{read_request, ParsedRequest, RequestError};
