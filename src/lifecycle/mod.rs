//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Filters → Registry::create_plugin → on_init → Bind → Accept
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One misconfigured application never stops the others
//! - Shutdown has timeout: open connections are abandoned after the deadline

pub mod registry;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use registry::{PluginContext, Registry, WEBSOCKET_PLUGIN, WEB_PLUGIN};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{start, RunningApp, RunningServer, StartupError};
