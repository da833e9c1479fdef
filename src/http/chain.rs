//! Chain-of-responsibility dispatch for HTTP requests.
//!
//! # Responsibilities
//! - Define the `ChainNode` contract
//! - Traverse nodes in order, letting each decide whether to continue
//! - Build a chain from configuration through the factory registry
//!
//! # Design Decisions
//! - The chain is built once per application and is read-only afterwards
//! - Nodes write into a `ResponseSink`; the server owns the socket
//! - A node that fails to build is skipped, the rest still serve

use std::sync::Arc;

use crate::config::HandlerConfig;
use crate::content::{ContentError, ContentPipeline};
use crate::http::get::{DefaultGetHandler, DEFAULT_GET_HANDLER};
use crate::lifecycle::registry::Registry;
use crate::observability::metrics;
use crate::request::{InitConfig, InitError, ParsedRequest};

/// Errors raised by a chain node while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("node `{node}` has no content pipeline registered")]
    NoContent { node: String },

    #[error("node `{node}` failed: {reason}")]
    Failed { node: String, reason: String },
}

/// Bytes a chain produces for the client.
#[derive(Debug, Default)]
pub struct ResponseSink {
    bytes: Vec<u8>,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// One link of the HTTP dispatch chain.
///
/// Nodes run on the blocking pool, so `handle` may do synchronous I/O.
pub trait ChainNode: Send + Sync {
    fn name(&self) -> &str;

    /// Called once, with the node's own settings, before `register_content`.
    fn on_init(&mut self, _config: &InitConfig) -> Result<(), InitError> {
        Ok(())
    }

    /// Hand the node the application's content pipeline.
    fn register_content(&mut self, _pipeline: Arc<ContentPipeline>) {}

    fn can_handle(&self, request: &ParsedRequest) -> bool;

    /// Whether dispatch continues with the next node after this one.
    fn push_to_successor(&self) -> bool;

    fn handle(&self, request: &ParsedRequest, sink: &mut ResponseSink) -> Result<(), ChainError>;
}

/// Ordered chain of nodes.
#[derive(Default)]
pub struct HandlerChain {
    nodes: Vec<Box<dyn ChainNode>>,
}

impl HandlerChain {
    pub fn new(nodes: Vec<Box<dyn ChainNode>>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    /// Run the request through the chain. Returns the number of nodes that handled it.
    pub fn dispatch(&self, request: &ParsedRequest, sink: &mut ResponseSink) -> Result<usize, ChainError> {
        let mut handled = 0;
        let mut index = 0;
        while let Some(node) = self.nodes.get(index) {
            if node.can_handle(request) {
                tracing::debug!(node = node.name(), request = %request.first_line(), "Chain node handling request");
                node.handle(request, sink)?;
                handled += 1;
            }
            if index + 1 < self.nodes.len() && node.push_to_successor() {
                index += 1;
            } else {
                break;
            }
        }
        Ok(handled)
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain").field("nodes", &self.names()).finish()
    }
}

/// Result of building a chain.
#[derive(Debug)]
pub struct ChainBuild {
    pub chain: HandlerChain,
    pub built: usize,
    pub failed: usize,
}

/// Builds a chain from handler names and their definitions.
pub struct ChainBuilder<'a> {
    registry: &'a Registry,
    definitions: &'a [HandlerConfig],
    pipeline: Arc<ContentPipeline>,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(registry: &'a Registry, definitions: &'a [HandlerConfig], pipeline: Arc<ContentPipeline>) -> Self {
        Self {
            registry,
            definitions,
            pipeline,
        }
    }

    /// Instantiate each named node, then append the default GET node.
    pub fn build(&self, names: &[String]) -> ChainBuild {
        let mut nodes: Vec<Box<dyn ChainNode>> = Vec::with_capacity(names.len() + 1);
        let mut failed = 0;

        for name in names {
            match self.build_node(name) {
                Ok(node) => {
                    tracing::info!(handler = %name, "Chain node instantiated");
                    metrics::record_chain_node("built");
                    nodes.push(node);
                }
                Err(e) => {
                    tracing::error!(handler = %name, error = %e, "Chain node skipped");
                    metrics::record_chain_node("failed");
                    failed += 1;
                }
            }
        }
        let built = nodes.len();

        let mut default_get = DefaultGetHandler::new();
        default_get.register_content(Arc::clone(&self.pipeline));
        nodes.push(Box::new(default_get));

        tracing::info!(built, failed, "Handler chain ready");
        ChainBuild {
            chain: HandlerChain::new(nodes),
            built,
            failed,
        }
    }

    fn build_node(&self, name: &str) -> Result<Box<dyn ChainNode>, NodeBuildError> {
        let definition = self
            .definitions
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| NodeBuildError::MissingDefinition(name.to_string()))?;
        // The default GET node is always appended by `build`.
        if definition.class == DEFAULT_GET_HANDLER {
            return Err(NodeBuildError::ReservedClass(definition.class.clone()));
        }

        let mut node = self
            .registry
            .create_node(&definition.class)
            .ok_or_else(|| NodeBuildError::UnknownClass(definition.class.clone()))?;

        let mut settings = definition.settings.clone();
        settings.insert("name".to_string(), definition.name.clone());
        settings.insert("class".to_string(), definition.class.clone());
        node.on_init(&settings)?;
        node.register_content(Arc::clone(&self.pipeline));
        Ok(node)
    }
}

/// Why a configured node could not be built.
#[derive(Debug, thiserror::Error)]
pub enum NodeBuildError {
    #[error("no handler definition named `{0}`")]
    MissingDefinition(String),

    #[error("no chain node registered for class `{0}`")]
    UnknownClass(String),

    #[error("class `{0}` is appended to every chain and cannot be configured")]
    ReservedClass(String),

    #[error("initialization failed: {0}")]
    Init(#[from] InitError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        can: bool,
        push: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ChainNode for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn can_handle(&self, _request: &ParsedRequest) -> bool {
            self.can
        }

        fn push_to_successor(&self) -> bool {
            self.push
        }

        fn handle(&self, _request: &ParsedRequest, sink: &mut ResponseSink) -> Result<(), ChainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sink.write(self.name.as_bytes());
            Ok(())
        }
    }

    fn scripted(name: &'static str, can: bool, push: bool) -> (Box<dyn ChainNode>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(Scripted { name, can, push, calls: Arc::clone(&calls) }), calls)
    }

    fn get() -> ParsedRequest {
        ParsedRequest::new(vec!["GET / HTTP/1.1".into()], Vec::new())
    }

    #[test]
    fn stops_at_node_that_does_not_push() {
        let (a, a_calls) = scripted("A", false, true);
        let (b, b_calls) = scripted("B", true, false);
        let (c, c_calls) = scripted("C", true, true);
        let chain = HandlerChain::new(vec![a, b, c]);

        let mut sink = ResponseSink::new();
        assert_eq!(chain.dispatch(&get(), &mut sink).unwrap(), 1);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.as_bytes(), b"B");
    }

    #[test]
    fn pushing_nodes_all_run_in_order() {
        let (a, _) = scripted("A", true, true);
        let (b, _) = scripted("B", false, true);
        let (c, _) = scripted("C", true, true);
        let chain = HandlerChain::new(vec![a, b, c]);

        let mut sink = ResponseSink::new();
        assert_eq!(chain.dispatch(&get(), &mut sink).unwrap(), 2);
        assert_eq!(sink.into_bytes(), b"AC");
    }

    #[test]
    fn empty_chain_handles_nothing() {
        let mut sink = ResponseSink::new();
        assert_eq!(HandlerChain::default().dispatch(&get(), &mut sink).unwrap(), 0);
        assert!(sink.is_empty());
    }
}
