//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, bounded worker pool)
//!     → connection.rs (identity, lifetime tracking)
//!     → Hand off to the application's RequestHandler
//! ```
//!
//! # Design Decisions
//! - A worker permit is taken before accepting, so a full pool stops accepting
//! - Each connection tracked for graceful shutdown
//! - One acceptor per port; a failing port never affects the others

pub mod connection;
pub mod listener;

pub use connection::{Connection, ConnectionId, ConnectionParts, ConnectionTracker};
pub use listener::{Acceptor, ListenerError};
