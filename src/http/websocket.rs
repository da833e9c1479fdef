//! An application that only speaks WebSocket.
//!
//! Requests without a `Sec-WebSocket-Key` header are closed without a reply.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::server::ServeError;
use crate::lifecycle::registry::PluginContext;
use crate::net::connection::Connection;
use crate::request::{read_request, InitConfig, InitError, RequestHandler};
use crate::websocket::{self, LoggingCallbacks, WebSocketCallbacks};

pub struct PureWebSocketHandler {
    context: PluginContext,
    callbacks: Arc<dyn WebSocketCallbacks>,
}

impl PureWebSocketHandler {
    pub fn new(context: PluginContext) -> Self {
        Self {
            context,
            callbacks: Arc::new(LoggingCallbacks),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn WebSocketCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    async fn serve(&self, connection: Connection) -> Result<(), ServeError> {
        let peer = connection.peer();
        self.context.filters.check_connection(peer.ip())?;

        let mut parts = connection.into_parts();
        let request = read_request(&mut parts.reader, self.context.max_body_size).await?;
        self.context.filters.check_request(peer.ip(), &request)?;

        match request.websocket_key() {
            Some(key) => {
                let key = key.to_string();
                websocket::upgrade(parts, &key, Arc::clone(&self.callbacks), self.context.max_frame_size).await?;
            }
            None => {
                tracing::debug!(
                    connection_id = %parts.id,
                    request = %request.first_line(),
                    "Not a WebSocket upgrade, closing"
                );
            }
        }
        Ok(())
    }
}

impl RequestHandler for PureWebSocketHandler {
    fn on_init(&mut self, _config: &InitConfig) -> Result<(), InitError> {
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
                    tracing::warn!(connection_id = %id, error = %e, "WebSocket connection failed");
                }
            }
        })
    }
}

impl std::fmt::Debug for PureWebSocketHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PureWebSocketHandler").finish_non_exhaustive()
    }
}
