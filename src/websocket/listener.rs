//! Session callbacks and the per-session read loop.
//!
//! # Data Flow
//! ```text
//! upgrade():
//!     handshake written and flushed      (Connecting → Open)
//!     → on_new_connection
//!     → read loop spawned as its own task
//!
//! read loop:
//!     read_text → on_message_received → read_text → ...
//!     first decode error                  (Open → Closed)
//!     → on_connection_ended, exactly once
//! ```

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::net::connection::{ConnectionGuard, ConnectionParts, ConnectionReader};
use crate::observability::metrics;
use crate::websocket::{frame, WebSocketSession, WsError};

/// Greeting sent to every new session by [`LoggingCallbacks`].
pub const GREETING: &str = "connection established via websocket, now listening to your message";

/// Application hooks for WebSocket sessions.
///
/// Errors returned by a hook are logged; they never end the session.
pub trait WebSocketCallbacks: Send + Sync {
    fn on_new_connection(&self, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>>;

    fn on_message_received(&self, message: String, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>>;

    fn on_connection_ended(&self, session: Arc<WebSocketSession>) -> BoxFuture<'_, ()>;
}

/// Greets sessions and logs their traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallbacks;

impl WebSocketCallbacks for LoggingCallbacks {
    fn on_new_connection(&self, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>> {
        Box::pin(async move { session.send(GREETING).await })
    }

    fn on_message_received(&self, message: String, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>> {
        Box::pin(async move {
            tracing::info!(session = %session.id(), key = %session.key(), message = %message, "WebSocket message");
            Ok(())
        })
    }

    fn on_connection_ended(&self, session: Arc<WebSocketSession>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            tracing::info!(session = %session.id(), key = %session.key(), "WebSocket connection closed");
        })
    }
}

/// A session whose read loop is running.
#[derive(Debug)]
pub struct Upgraded {
    pub session: Arc<WebSocketSession>,
    /// Completes after `on_connection_ended` has run.
    pub read_loop: JoinHandle<()>,
}

/// Turn an HTTP connection into a WebSocket session.
///
/// On handshake failure no session exists and no callback runs.
pub async fn upgrade(
    parts: ConnectionParts,
    key: &str,
    callbacks: Arc<dyn WebSocketCallbacks>,
    max_frame_size: usize,
) -> Result<Upgraded, WsError> {
    let ConnectionParts {
        id,
        peer,
        reader,
        writer,
        guard,
    } = parts;

    let session = Arc::new(WebSocketSession::new(id, peer, key, writer));
    session.handshake().await?;
    tracing::debug!(session = %id, peer = %peer, "WebSocket handshake completed");
    metrics::websocket_opened();

    if let Err(e) = callbacks.on_new_connection(Arc::clone(&session)).await {
        tracing::warn!(session = %id, error = %e, "New connection callback failed");
    }

    let read_loop = tokio::spawn(run_read_loop(
        Arc::clone(&session),
        reader,
        callbacks,
        max_frame_size,
        guard,
    ));

    Ok(Upgraded { session, read_loop })
}

async fn run_read_loop(
    session: Arc<WebSocketSession>,
    mut reader: ConnectionReader,
    callbacks: Arc<dyn WebSocketCallbacks>,
    max_frame_size: usize,
    _guard: Option<ConnectionGuard>,
) {
    loop {
        match frame::read_text(&mut reader, max_frame_size).await {
            Ok(message) => {
                if let Err(e) = callbacks.on_message_received(message, Arc::clone(&session)).await {
                    tracing::warn!(session = %session.id(), error = %e, "Message callback failed");
                }
            }
            Err(e) => {
                tracing::debug!(session = %session.id(), error = %e, "WebSocket read loop ended");
                break;
            }
        }
    }

    session.mark_closed();
    callbacks.on_connection_ended(Arc::clone(&session)).await;
    metrics::websocket_closed();
}
