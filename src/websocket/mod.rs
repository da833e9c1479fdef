//! WebSocket subsystem.
//!
//! # Data Flow
//! ```text
//! ParsedRequest with Sec-WebSocket-Key
//!     → handshake.rs (101 response)
//!     → session.rs (WebSocketSession, Open)
//!     → listener.rs (read loop task → WebSocketCallbacks)
//!     → frame.rs (text frame codec)
//! ```
//!
//! # Design Decisions
//! - Text frames only; any other opcode ends the session
//! - Read loops run outside the HTTP worker pool

pub mod frame;
pub mod handshake;
pub mod listener;
pub mod registry;
pub mod session;

pub use frame::{Frame, DEFAULT_MAX_FRAME_SIZE};
pub use listener::{upgrade, LoggingCallbacks, Upgraded, WebSocketCallbacks};
pub use registry::SessionRegistry;
pub use session::{SessionState, WebSocketSession};

/// Errors raised by the WebSocket engine.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("websocket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported opcode {0}, only text frames are accepted")]
    UnsupportedOpcode(u8),

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: u64, limit: usize },

    #[error("frame payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("session is {0}")]
    NotOpen(SessionState),
}
