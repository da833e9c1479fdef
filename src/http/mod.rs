//! HTTP application subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (from net::Acceptor)
//!     → server.rs (filters, request framing, upgrade detection)
//!     → chain.rs (configured nodes in order)
//!     → get.rs (default GET node, content pipeline)
//!     → Send to client, close
//!
//! websocket.rs: same front half, upgrade only
//! ```

pub mod chain;
pub mod get;
pub mod server;
pub mod websocket;

pub use chain::{ChainBuild, ChainBuilder, ChainError, ChainNode, HandlerChain, NodeBuildError, ResponseSink};
pub use get::{DefaultGetHandler, DEFAULT_GET_HANDLER};
pub use server::{ServeError, WebServerHandler};
pub use websocket::PureWebSocketHandler;
