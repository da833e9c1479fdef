//! One upgraded connection.
//!
//! # Responsibilities
//! - Own the write half behind a per-session lock
//! - Track the `Connecting → Open → Closed` lifecycle
//!
//! # Design Decisions
//! - `send` may be called concurrently from any task; whole frames are
//!   written under the lock so they never interleave
//! - The read half is not part of the session, it belongs to the read loop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::net::connection::{ConnectionId, ConnectionWriter};
use crate::websocket::{frame, handshake, WsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A WebSocket session.
pub struct WebSocketSession {
    id: ConnectionId,
    peer: SocketAddr,
    key: String,
    state: AtomicU8,
    writer: Mutex<ConnectionWriter>,
}

impl WebSocketSession {
    pub fn new(id: ConnectionId, peer: SocketAddr, key: impl Into<String>, writer: ConnectionWriter) -> Self {
        Self {
            id,
            peer,
            key: key.into(),
            state: AtomicU8::new(SessionState::Connecting.as_u8()),
            writer: Mutex::new(writer),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The client's `Sec-WebSocket-Key`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Answer the upgrade request and open the session.
    pub async fn handshake(&self) -> Result<(), WsError> {
        let mut writer = self.writer.lock().await;
        let result = handshake::write_handshake(&mut *writer, &self.key).await;
        match result {
            Ok(()) => {
                self.transition(SessionState::Connecting, SessionState::Open);
                Ok(())
            }
            Err(e) => {
                self.state.store(SessionState::Closed.as_u8(), Ordering::Release);
                Err(e)
            }
        }
    }

    /// Send one text frame.
    pub async fn send(&self, text: &str) -> Result<(), WsError> {
        let mut writer = self.writer.lock().await;
        let state = self.state();
        if state != SessionState::Open {
            return Err(WsError::NotOpen(state));
        }
        writer.write_all(&frame::encode_text(text)).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the session from the server side.
    ///
    /// The read loop notices the closed stream and fires the ended callback.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        self.state.store(SessionState::Closed.as_u8(), Ordering::Release);
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(session = %self.id, error = %e, "Shutdown of closed session failed");
        }
    }

    /// Move to `Closed`. Returns `false` if the session was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        self.state.swap(SessionState::Closed.as_u8(), Ordering::AcqRel) != SessionState::Closed.as_u8()
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::Connection;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn session() -> (WebSocketSession, DuplexStream) {
        let (server, client) = tokio::io::duplex(1 << 20);
        let parts = Connection::new(server, "127.0.0.1:5000".parse().unwrap()).into_parts();
        (WebSocketSession::new(parts.id, parts.peer, "dGhlIHNhbXBsZSBub25jZQ==", parts.writer), client)
    }

    #[tokio::test]
    async fn handshake_opens_session() {
        let (session, mut client) = session();
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(matches!(session.send("early").await, Err(WsError::NotOpen(SessionState::Connecting))));

        session.handshake().await.unwrap();
        assert!(session.is_open());

        let mut buf = vec![0u8; 256];
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 101"));
    }

    #[tokio::test]
    async fn concurrent_sends_never_interleave() {
        let (session, mut client) = session();
        session.handshake().await.unwrap();
        let mut response = vec![0u8; handshake::handshake_response(session.key()).len()];
        client.read_exact(&mut response).await.unwrap();

        let session = Arc::new(session);
        let long = "l".repeat(70_000);
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                let text = if i % 2 == 0 { long.clone() } else { format!("short-{i}") };
                tokio::spawn(async move { session.send(&text).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        for _ in 0..8 {
            let text = frame::read_text(&mut client, frame::DEFAULT_MAX_FRAME_SIZE).await.unwrap();
            assert!(text == long || text.starts_with("short-"));
        }
    }

    #[tokio::test]
    async fn sending_on_closed_session_fails() {
        let (session, _client) = session();
        session.handshake().await.unwrap();
        session.close().await;

        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.send("late").await, Err(WsError::NotOpen(SessionState::Closed))));
        assert!(!session.mark_closed());
    }
}
