//! Template-driven request blockers.
//!
//! # Responsibilities
//! - Load block rules from plain-text files, one rule per line
//! - Decide whether a client address or requested resource is blocked
//!
//! # Design Decisions
//! - Rules are loaded once at startup and never mutated afterwards
//! - Invalid lines are skipped with a warning; the rest of the file still loads
//! - Hostnames are checked for syntax only, no name resolution happens

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::request::ParsedRequest;

/// Errors raised while loading a blocklist file.
#[derive(Debug, thiserror::Error)]
pub enum BlockerError {
    #[error("failed to read blocklist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a blocker may inspect about a connection.
///
/// `request` is `None` when the check runs before the request is read.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub peer: IpAddr,
    pub request: Option<&'a ParsedRequest>,
}

impl<'a> FilterContext<'a> {
    pub fn connection(peer: IpAddr) -> Self {
        Self { peer, request: None }
    }

    pub fn request(peer: IpAddr, request: &'a ParsedRequest) -> Self {
        Self {
            peer,
            request: Some(request),
        }
    }
}

/// A set of rules loaded from a template file.
pub trait Blocker: Send + Sync {
    /// Label used in logs and metrics.
    fn name(&self) -> &'static str;

    fn is_blocked(&self, ctx: &FilterContext<'_>) -> bool;

    fn is_valid_template(&self, line: &str) -> bool;

    fn store_template(&mut self, line: &str);

    /// Load every valid line of `path`. Returns the number of rules stored.
    fn parse_template(&mut self, path: &Path) -> Result<usize, BlockerError> {
        let content = std::fs::read_to_string(path).map_err(|source| BlockerError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stored = 0;
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if self.is_valid_template(line) {
                self.store_template(line);
                stored += 1;
            } else {
                tracing::warn!(
                    blocker = self.name(),
                    file = %path.display(),
                    line = number + 1,
                    rule = %line,
                    "Skipping invalid block rule"
                );
            }
        }
        Ok(stored)
    }
}

/// Blocks clients by address.
#[derive(Debug, Default)]
pub struct IpAddressBlocker {
    rules: HashSet<String>,
}

impl IpAddressBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Blocker for IpAddressBlocker {
    fn name(&self) -> &'static str {
        "ip"
    }

    fn is_blocked(&self, ctx: &FilterContext<'_>) -> bool {
        self.rules.contains(&ctx.peer.to_string())
    }

    fn is_valid_template(&self, line: &str) -> bool {
        line.parse::<IpAddr>().is_ok() || is_valid_hostname(line)
    }

    fn store_template(&mut self, line: &str) {
        // Canonical form so `::0001` matches the peer's `::1`.
        let rule = match line.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => line.to_string(),
        };
        self.rules.insert(rule);
    }
}

/// RFC 1123 hostname syntax.
fn is_valid_hostname(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

/// Blocks requests whose resource contains a stored substring.
#[derive(Debug, Default)]
pub struct UrlPatternBlocker {
    patterns: HashSet<String>,
}

impl UrlPatternBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Blocker for UrlPatternBlocker {
    fn name(&self) -> &'static str {
        "url"
    }

    fn is_blocked(&self, ctx: &FilterContext<'_>) -> bool {
        let Some(request) = ctx.request else {
            return false;
        };
        let resource = request.resource();
        self.patterns.iter().any(|pattern| resource.contains(pattern.as_str()))
    }

    fn is_valid_template(&self, line: &str) -> bool {
        !line.is_empty()
    }

    fn store_template(&mut self, line: &str) {
        tracing::trace!(pattern = %line, "Pattern blocked");
        self.patterns.insert(line.to_string());
    }
}
