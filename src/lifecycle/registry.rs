//! Factories for plugins and chain nodes, looked up by class identifier.
//!
//! Configuration names implementations by a string (`class = "web"`). The
//! registry maps those strings onto constructors so applications and chain
//! nodes can be assembled at startup without compile-time wiring.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::HandlerConfig;
use crate::http::chain::ChainNode;
use crate::http::{PureWebSocketHandler, WebServerHandler};
use crate::request::RequestHandler;
use crate::security::RequestFilters;
use crate::websocket::DEFAULT_MAX_FRAME_SIZE;

/// Class identifier of the web server plugin.
pub const WEB_PLUGIN: &str = "web";

/// Class identifier of the WebSocket-only plugin.
pub const WEBSOCKET_PLUGIN: &str = "websocket";

/// Everything a plugin needs from its surroundings.
#[derive(Clone)]
pub struct PluginContext {
    pub registry: Arc<Registry>,
    /// All chain node definitions of the configuration.
    pub handlers: Arc<[HandlerConfig]>,
    pub filters: Arc<RequestFilters>,
    pub max_body_size: usize,
    pub max_frame_size: usize,
}

impl PluginContext {
    /// A context with no filters, no node definitions and default limits.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            handlers: Arc::from(Vec::new()),
            filters: Arc::new(RequestFilters::default()),
            max_body_size: 2 * 1024 * 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("handlers", &self.handlers.len())
            .field("max_body_size", &self.max_body_size)
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}

type PluginFactory = Arc<dyn Fn(PluginContext) -> Box<dyn RequestHandler> + Send + Sync>;
type NodeFactory = Arc<dyn Fn() -> Box<dyn ChainNode> + Send + Sync>;

/// Class identifier → constructor.
#[derive(Default)]
pub struct Registry {
    plugins: HashMap<String, PluginFactory>,
    nodes: HashMap<String, NodeFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the plugins shipped with the server.
    ///
    /// The default GET node is not a class; every chain gets it from `ChainBuilder`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_plugin(WEB_PLUGIN, |ctx| Box::new(WebServerHandler::new(ctx)));
        registry.register_plugin(WEBSOCKET_PLUGIN, |ctx| Box::new(PureWebSocketHandler::new(ctx)));
        registry
    }

    pub fn register_plugin<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn(PluginContext) -> Box<dyn RequestHandler> + Send + Sync + 'static,
    {
        self.plugins.insert(class.into(), Arc::new(factory));
    }

    pub fn register_node<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ChainNode> + Send + Sync + 'static,
    {
        self.nodes.insert(class.into(), Arc::new(factory));
    }

    /// Instantiate a plugin. `None` if the class is unknown.
    pub fn create_plugin(&self, class: &str, context: PluginContext) -> Option<Box<dyn RequestHandler>> {
        self.plugins.get(class).map(|factory| factory(context))
    }

    /// Instantiate a chain node. `None` if the class is unknown.
    pub fn create_node(&self, class: &str) -> Option<Box<dyn ChainNode>> {
        self.nodes.get(class).map(|factory| factory())
    }

    pub fn has_plugin(&self, class: &str) -> bool {
        self.plugins.contains_key(class)
    }

    pub fn has_node(&self, class: &str) -> bool {
        self.nodes.contains_key(class)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut plugins: Vec<_> = self.plugins.keys().collect();
        plugins.sort();
        let mut nodes: Vec<_> = self.nodes.keys().collect();
        nodes.sort();
        f.debug_struct("Registry")
            .field("plugins", &plugins)
            .field("nodes", &nodes)
            .finish()
    }
}
