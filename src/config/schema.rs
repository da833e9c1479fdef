//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::request::InitConfig;

/// Root configuration for the socket server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request filtering and framing limits.
    pub security: SecurityConfig,

    /// WebSocket protocol limits.
    pub websocket: WebSocketConfig,

    /// Applications, one acceptor each.
    #[serde(rename = "plugin")]
    pub plugins: Vec<PluginConfig>,

    /// Chain node definitions referenced by name from plugins.
    #[serde(rename = "handler")]
    pub handlers: Vec<HandlerConfig>,
}

impl ServerConfig {
    /// Look up a chain node definition by name.
    pub fn handler(&self, name: &str) -> Option<&HandlerConfig> {
        self.handlers.iter().find(|h| h.name == name)
    }

    /// Plugins marked active, in declaration order.
    pub fn active_plugins(&self) -> impl Iterator<Item = &PluginConfig> {
        self.plugins.iter().filter(|p| p.active)
    }
}

/// One application: a port, a worker pool and a plugin class.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Unique application name.
    pub name: String,

    /// Registry identifier of the plugin (`web`, `websocket`, ...).
    pub class: String,

    pub port: u16,

    /// Root folder content is served from.
    pub public_folder: String,

    /// Worker pool size.
    pub threads: usize,

    /// Chain node names, in dispatch order.
    pub handlers: Vec<String>,

    /// Inactive plugins are parsed but never started.
    pub active: bool,

    /// Free-form settings passed through to `on_init`.
    pub settings: HashMap<String, String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            class: "web".to_string(),
            port: 8080,
            public_folder: "html".to_string(),
            threads: 3,
            handlers: Vec::new(),
            active: true,
            settings: HashMap::new(),
        }
    }
}

impl PluginConfig {
    /// String mapping handed to the plugin's `on_init`.
    ///
    /// Free-form settings never override the structural keys.
    pub fn init_map(&self) -> InitConfig {
        let mut map = self.settings.clone();
        map.insert("name".to_string(), self.name.clone());
        map.insert("class".to_string(), self.class.clone());
        map.insert("port".to_string(), self.port.to_string());
        map.insert("publicfolder".to_string(), self.public_folder.clone());
        map.insert("thread".to_string(), self.threads.to_string());
        map.insert("handlers".to_string(), self.handlers.join(";"));
        map
    }
}

/// A chain node definition.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub name: String,

    /// Registry identifier of the node implementation.
    pub class: String,

    pub settings: HashMap<String, String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error, or a full directive).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "socket_server=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Request filtering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Blocked client addresses, one per line.
    pub ip_blocklist: String,

    /// Blocked resource substrings, one per line.
    pub url_blocklist: String,

    /// Largest `Content-Length` accepted, in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ip_blocklist: "blocked.global".to_string(),
            url_blocklist: "blocked.pattern.global".to_string(),
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Largest accepted frame payload, in bytes.
    pub max_frame_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}
