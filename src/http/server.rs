//! The web application: static files, a handler chain and WebSocket upgrades.
//!
//! # Data Flow
//! ```text
//! Connection
//!     → IP filter (nothing read yet)
//!     → read_request
//!     → URL filter
//!     → Sec-WebSocket-Key present?  → websocket::upgrade, worker returns
//!     → otherwise HandlerChain::dispatch on the blocking pool
//!     → write response, close
//! ```

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;

use crate::content::{ContentPipeline, DEFAULT_ROOT};
use crate::http::chain::{ChainBuilder, ChainError, HandlerChain, ResponseSink};
use crate::lifecycle::registry::PluginContext;
use crate::net::connection::Connection;
use crate::observability::metrics;
use crate::request::{flag, read_request, InitConfig, InitError, RequestError, RequestHandler};
use crate::security::Rejection;
use crate::websocket::{self, LoggingCallbacks, WebSocketCallbacks, WsError};

/// Why a connection was not served to completion.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Blocked(#[from] Rejection),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("websocket upgrade failed: {0}")]
    WebSocket(#[from] WsError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),

    #[error("chain worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Serves a folder of static files, optionally behind configured chain nodes.
///
/// Settings read by `on_init`:
///
/// | key            | default | meaning                                   |
/// |----------------|---------|-------------------------------------------|
/// | `publicfolder` | `html`  | root of the served files                  |
/// | `handlers`     | empty   | `;`-separated chain node names            |
/// | `cache`        | `true`  | cache file contents by modification time  |
/// | `compress`     | `false` | gzip file bodies                          |
/// | `websocket`    | `true`  | accept WebSocket upgrades                 |
pub struct WebServerHandler {
    context: PluginContext,
    chain: Arc<HandlerChain>,
    callbacks: Option<Arc<dyn WebSocketCallbacks>>,
}

impl WebServerHandler {
    /// Serve `html/` with the default node only and log WebSocket traffic.
    pub fn new(context: PluginContext) -> Self {
        let pipeline = Arc::new(ContentPipeline::builder(DEFAULT_ROOT).build());
        let chain = ChainBuilder::new(&context.registry, &context.handlers, pipeline)
            .build(&[])
            .chain;
        Self {
            context,
            chain: Arc::new(chain),
            callbacks: Some(Arc::new(LoggingCallbacks)),
        }
    }

    /// Replace the WebSocket callbacks.
    pub fn with_callbacks(mut self, callbacks: Arc<dyn WebSocketCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Treat upgrade requests as plain HTTP.
    pub fn without_websocket(mut self) -> Self {
        self.callbacks = None;
        self
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    async fn serve(&self, connection: Connection) -> Result<(), ServeError> {
        let peer = connection.peer();
        self.context.filters.check_connection(peer.ip())?;

        let mut parts = connection.into_parts();
        let request = read_request(&mut parts.reader, self.context.max_body_size).await?;
        let start = Instant::now();
        tracing::info!(
            connection_id = %parts.id,
            peer_addr = %peer,
            request = %request.first_line(),
            "Request received"
        );
        self.context.filters.check_request(peer.ip(), &request)?;

        if let (Some(key), Some(callbacks)) = (request.websocket_key(), &self.callbacks) {
            let key = key.to_string();
            let upgraded = websocket::upgrade(parts, &key, Arc::clone(callbacks), self.context.max_frame_size).await?;
            tracing::debug!(session = %upgraded.session.id(), "Connection handed to WebSocket session");
            metrics::record_request(request.method(), start);
            return Ok(());
        }

        let chain = Arc::clone(&self.chain);
        let (request, sink, outcome) = tokio::task::spawn_blocking(move || {
            let mut sink = ResponseSink::new();
            let outcome = chain.dispatch(&request, &mut sink);
            (request, sink, outcome)
        })
        .await?;

        if !sink.is_empty() {
            parts.writer.write_all(sink.as_bytes()).await?;
        }
        parts.writer.flush().await?;
        parts.writer.shutdown().await?;
        metrics::record_request(request.method(), start);

        let handled = outcome?;
        tracing::debug!(connection_id = %parts.id, handled, bytes = sink.as_bytes().len(), "Response written");
        Ok(())
    }
}

impl RequestHandler for WebServerHandler {
    fn on_init(&mut self, config: &InitConfig) -> Result<(), InitError> {
        let root = config.get("publicfolder").map(String::as_str).unwrap_or(DEFAULT_ROOT);
        let pipeline = ContentPipeline::builder(root)
            .cached(flag(config, "cache", true)?)
            .compress(flag(config, "compress", false)?)
            .build();
        tracing::debug!(pipeline = ?pipeline, "Content pipeline ready");

        let names: Vec<String> = config
            .get("handlers")
            .map(|list| {
                list.split(';')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let build = ChainBuilder::new(&self.context.registry, &self.context.handlers, Arc::new(pipeline)).build(&names);
        if build.failed > 0 {
            tracing::warn!(failed = build.failed, "Some chain nodes could not be built");
        }
        self.chain = Arc::new(build.chain);

        if !flag(config, "websocket", true)? {
            self.callbacks = None;
        } else if self.callbacks.is_none() {
            self.callbacks = Some(Arc::new(LoggingCallbacks));
        }
        Ok(())
    }

    fn handle_connection(&self, connection: Connection) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let id = connection.id();
            match self.serve(connection).await {
                Ok(()) => {}
                Err(ServeError::Blocked(rejection)) => {
                    tracing::info!(connection_id = %id, reason = %rejection, "Connection blocked");
                }
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Connection failed");
                }
            }
        })
    }
}

impl std::fmt::Debug for WebServerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServerHandler")
            .field("chain", &self.chain)
            .field("websocket", &self.callbacks.is_some())
            .finish_non_exhaustive()
    }
}
