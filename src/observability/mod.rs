//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Subscriber and recorder are installed once, by the binary
//! - Recording without an installed recorder is a no-op, so the library
//!   and its tests never depend on initialization

pub mod logging;
pub mod metrics;
