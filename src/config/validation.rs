//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, pool sizes, frame limits)
//! - Detect conflicting applications (duplicate names, shared ports)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Handler names a plugin cannot resolve are not errors here; the chain
//!   builder skips and counts them

use std::collections::{HashMap, HashSet};

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field (`plugin[0].port`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every error found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.websocket.max_frame_size == 0 {
        errors.push(ValidationError::new("websocket.max_frame_size", "must be greater than zero"));
    }

    let mut names = HashSet::new();
    let mut ports: HashMap<u16, &str> = HashMap::new();
    for (i, plugin) in config.plugins.iter().enumerate() {
        let field = |name: &str| format!("plugin[{i}].{name}");

        if plugin.name.trim().is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !names.insert(plugin.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate application name `{}`", plugin.name),
            ));
        }

        if plugin.port == 0 {
            errors.push(ValidationError::new(field("port"), "must not be 0"));
        } else if plugin.active {
            if let Some(other) = ports.insert(plugin.port, plugin.name.as_str()) {
                errors.push(ValidationError::new(
                    field("port"),
                    format!("port {} already used by `{other}`", plugin.port),
                ));
            }
        }

        if plugin.threads == 0 {
            errors.push(ValidationError::new(field("threads"), "must be greater than zero"));
        }
    }

    let mut handler_names = HashSet::new();
    for (i, handler) in config.handlers.iter().enumerate() {
        if handler.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("handler[{i}].name"), "must not be empty"));
        } else if !handler_names.insert(handler.name.as_str()) {
            errors.push(ValidationError::new(
                format!("handler[{i}].name"),
                format!("duplicate handler name `{}`", handler.name),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{HandlerConfig, PluginConfig};

    fn plugin(name: &str, port: u16) -> PluginConfig {
        PluginConfig {
            name: name.into(),
            port,
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.plugins = vec![plugin("", 0), plugin("a", 80), plugin("a", 80)];
        config.plugins[1].threads = 0;
        config.websocket.max_frame_size = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            [
                "websocket.max_frame_size",
                "plugin[0].name",
                "plugin[0].port",
                "plugin[1].threads",
                "plugin[2].name",
                "plugin[2].port",
            ]
        );
    }

    #[test]
    fn inactive_plugins_may_share_a_port() {
        let mut config = ServerConfig::default();
        config.plugins = vec![plugin("a", 80), plugin("b", 80)];
        config.plugins[1].active = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_duplicate_handler_names() {
        let mut config = ServerConfig::default();
        config.handlers = vec![
            HandlerConfig { name: "h".into(), ..Default::default() },
            HandlerConfig { name: "h".into(), ..Default::default() },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "handler[1].name");
    }
}
