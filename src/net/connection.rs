//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Own the client byte stream for exactly one worker
//! - Track live connections so shutdown can drain them

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Any bidirectional byte stream a connection can run over.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Boxed stream backing a [`Connection`].
pub type BoxedStream = Box<dyn ByteStream>;

/// Buffered read half of a connection.
pub type ConnectionReader = BufReader<ReadHalf<BoxedStream>>;

/// Write half of a connection.
pub type ConnectionWriter = WriteHalf<BoxedStream>;

/// An accepted client connection, owned by a single worker.
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    stream: BoxedStream,
    guard: Option<ConnectionGuard>,
}

impl Connection {
    /// Wrap a stream that is not tracked by any acceptor.
    pub fn new<S: ByteStream + 'static>(stream: S, peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            stream: Box::new(stream),
            guard: None,
        }
    }

    /// Wrap a stream whose lifetime is counted by a [`ConnectionTracker`].
    pub fn tracked<S: ByteStream + 'static>(stream: S, peer: SocketAddr, guard: ConnectionGuard) -> Self {
        Self {
            id: guard.id(),
            peer,
            stream: Box::new(stream),
            guard: Some(guard),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address of the client.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Split into a buffered reader and a writer.
    ///
    /// The reader keeps any bytes buffered past the HTTP request, so a
    /// WebSocket read loop started on it never loses data.
    pub fn into_parts(self) -> ConnectionParts {
        let (read, write) = tokio::io::split(self.stream);
        ConnectionParts {
            id: self.id,
            peer: self.peer,
            reader: BufReader::new(read),
            writer: write,
            guard: self.guard,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// The pieces of a split [`Connection`].
pub struct ConnectionParts {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub reader: ConnectionReader,
    pub writer: ConnectionWriter,
    /// Dropping the guard marks the connection closed in its tracker.
    pub guard: Option<ConnectionGuard>,
}

/// Tracks active connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all connections are closed or the deadline passes.
    ///
    /// Returns `true` when every connection drained in time.
    pub async fn wait_for_drain(&self, deadline: Duration) -> bool {
        let poll = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(deadline, poll).await.is_ok()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn tracked_connection_releases_on_drop() {
        let tracker = ConnectionTracker::new();
        let (server, _client) = tokio::io::duplex(64);
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        let conn = Connection::tracked(server, peer, tracker.track());
        assert_eq!(tracker.active_count(), 1);

        let parts = conn.into_parts();
        assert_eq!(parts.peer, peer);
        drop(parts);
        assert!(tracker.wait_for_drain(Duration::from_millis(200)).await);
    }
}
