//! Pluggable connection handler contract.

use std::collections::HashMap;

use futures_util::future::BoxFuture;

use crate::net::connection::Connection;

/// String configuration handed to plugins and chain nodes at creation.
pub type InitConfig = HashMap<String, String>;

/// Error raised by `on_init` when a configuration value cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("missing required setting `{0}`")]
    MissingSetting(String),

    #[error("initialization I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Handles the connections accepted on one port.
///
/// An acceptor is built against exactly one handler. `handle_connection` runs
/// inside a worker slot; it owns the connection and closes it by dropping it.
pub trait RequestHandler: Send + Sync {
    /// Called once after construction, before any connection is accepted.
    fn on_init(&mut self, config: &InitConfig) -> Result<(), InitError>;

    /// Serve one client connection to completion.
    fn handle_connection(&self, connection: Connection) -> BoxFuture<'_, ()>;
}

/// Read a boolean setting, accepting `true`/`false` in any case.
pub fn flag(config: &InitConfig, key: &str, default: bool) -> Result<bool, InitError> {
    match config.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "true" => Ok(true),
        Some(v) if v == "false" => Ok(false),
        Some(v) => Err(InitError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected true or false, got `{v}`"),
        }),
    }
}
