//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → IpAddressBlocker (peer address, before any byte is read)
//!     → request reader
//!     → UrlPatternBlocker (resource of the request line)
//!     → Pass to upgrade or chain
//! ```
//!
//! # Design Decisions
//! - Fail closed: a match closes the connection without writing a byte
//! - A missing blocklist file disables that blocker, it never stops startup

pub mod blocklist;

use std::net::IpAddr;
use std::path::Path;

pub use blocklist::{Blocker, BlockerError, FilterContext, IpAddressBlocker, UrlPatternBlocker};

use crate::config::SecurityConfig;
use crate::observability::metrics;
use crate::request::ParsedRequest;

/// A filter rejected the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection from {peer} rejected by {blocker} blocker")]
pub struct Rejection {
    pub peer: IpAddr,
    pub blocker: &'static str,
}

/// The filters applied to every connection of an application.
#[derive(Debug, Default)]
pub struct RequestFilters {
    ip: IpAddressBlocker,
    url: UrlPatternBlocker,
}

impl RequestFilters {
    pub fn new(ip: IpAddressBlocker, url: UrlPatternBlocker) -> Self {
        Self { ip, url }
    }

    /// Load both blocklists, logging and ignoring files that cannot be read.
    pub fn load(config: &SecurityConfig) -> Self {
        let mut ip = IpAddressBlocker::new();
        load_into(&mut ip, Path::new(&config.ip_blocklist));
        let mut url = UrlPatternBlocker::new();
        load_into(&mut url, Path::new(&config.url_blocklist));
        Self { ip, url }
    }

    /// Check the client address before the request is read.
    pub fn check_connection(&self, peer: IpAddr) -> Result<(), Rejection> {
        Self::check(&self.ip, &FilterContext::connection(peer))
    }

    /// Check a request once it has been read.
    pub fn check_request(&self, peer: IpAddr, request: &ParsedRequest) -> Result<(), Rejection> {
        Self::check(&self.url, &FilterContext::request(peer, request))
    }

    fn check(blocker: &dyn Blocker, ctx: &FilterContext<'_>) -> Result<(), Rejection> {
        if blocker.is_blocked(ctx) {
            metrics::record_blocked(blocker.name());
            return Err(Rejection {
                peer: ctx.peer,
                blocker: blocker.name(),
            });
        }
        Ok(())
    }
}

fn load_into(blocker: &mut dyn Blocker, path: &Path) {
    match blocker.parse_template(path) {
        Ok(count) => tracing::info!(blocker = blocker.name(), file = %path.display(), rules = count, "Blocklist loaded"),
        Err(e) => tracing::warn!(blocker = blocker.name(), error = %e, "Blocklist unavailable, nothing blocked"),
    }
}
