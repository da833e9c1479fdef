//! Per-port acceptor with a bounded worker pool.
//!
//! # Responsibilities
//! - Bind one port per application
//! - Accept incoming TCP connections
//! - Bound concurrent workers via semaphore (`threads`)
//! - Stop accepting on shutdown without cancelling in-flight workers

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};

use crate::net::connection::{Connection, ConnectionTracker};
use crate::observability::metrics;
use crate::request::RequestHandler;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("worker pool closed")]
    PoolClosed,
}

/// Accepts connections for one application and hands each to its handler.
///
/// At most `threads` connections are served at once. When the pool is full
/// the acceptor waits for a slot before accepting the next connection.
pub struct Acceptor {
    name: String,
    inner: TcpListener,
    workers: Arc<Semaphore>,
    threads: usize,
    handler: Arc<dyn RequestHandler>,
    tracker: ConnectionTracker,
}

impl Acceptor {
    /// Bind `port` on all interfaces.
    pub async fn bind(
        name: impl Into<String>,
        port: u16,
        threads: usize,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, ListenerError> {
        Self::bind_addr(name, SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), threads, handler).await
    }

    /// Bind an explicit address.
    pub async fn bind_addr(
        name: impl Into<String>,
        addr: SocketAddr,
        threads: usize,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = inner.local_addr().map_err(|source| ListenerError::Bind { addr, source })?;
        let name = name.into();
        let threads = threads.max(1);

        tracing::info!(
            app = %name,
            address = %local_addr,
            threads,
            "Listener bound"
        );

        Ok(Self {
            name,
            inner,
            workers: Arc::new(Semaphore::new(threads)),
            threads,
            handler,
            tracker: ConnectionTracker::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the local address this acceptor is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Configured worker pool size.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Get current available worker slots.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Tracker counting the connections this acceptor handed out.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept until shutdown is signalled or accepting fails.
    ///
    /// Workers already running finish on their own.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let port = self.local_addr().map(|a| a.port()).unwrap_or_default();

        loop {
            // Acquire permit first (backpressure)
            let permit = tokio::select! {
                _ = shutdown.recv() => break,
                permit = Arc::clone(&self.workers).acquire_owned() => {
                    permit.map_err(|_| ListenerError::PoolClosed)?
                }
            };

            let (stream, peer) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.inner.accept() => accepted.map_err(|e| {
                    tracing::error!(app = %self.name, error = %e, "Accept failed, stopping listener");
                    ListenerError::Accept(e)
                })?,
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }
            metrics::record_connection(port);

            let connection = Connection::tracked(stream, peer, self.tracker.track());
            tracing::debug!(
                app = %self.name,
                connection_id = %connection.id(),
                peer_addr = %peer,
                available_workers = self.workers.available_permits(),
                "Connection accepted"
            );

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                handler.handle_connection(connection).await;
                drop(permit);
            });
        }

        tracing::info!(app = %self.name, port, "Listener stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptor")
            .field("name", &self.name)
            .field("local_addr", &self.inner.local_addr().ok())
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{InitConfig, InitError};
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::Notify;

    /// Writes the connection id and parks until released.
    struct Parking {
        active: AtomicUsize,
        peak: AtomicUsize,
        release: Notify,
    }

    impl RequestHandler for Parking {
        fn on_init(&mut self, _config: &InitConfig) -> Result<(), InitError> {
            Ok(())
        }

        fn handle_connection(&self, connection: Connection) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                let mut parts = connection.into_parts();
                let _ = parts.writer.write_all(b"ok").await;
                self.release.notified().await;
                self.active.fetch_sub(1, Ordering::SeqCst);
            })
        }
    }

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn bounds_concurrent_workers() {
        let handler = Arc::new(Parking {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            release: Notify::new(),
        });
        let acceptor = Acceptor::bind_addr("bounded", loopback(), 2, handler.clone()).await.unwrap();
        let addr = acceptor.local_addr().unwrap();
        let (tx, _) = broadcast::channel(1);
        let task = tokio::spawn(acceptor.run(tx.subscribe()));

        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(TcpStream::connect(addr).await.unwrap());
        }

        let mut buf = [0u8; 2];
        clients[0].read_exact(&mut buf).await.unwrap();
        clients[1].read_exact(&mut buf).await.unwrap();
        // Third connection waits for a free worker.
        let third = tokio::time::timeout(Duration::from_millis(200), clients[2].read_exact(&mut buf)).await;
        assert!(third.is_err());
        assert_eq!(handler.peak.load(Ordering::SeqCst), 2);

        handler.release.notify_one();
        tokio::time::timeout(Duration::from_secs(2), clients[2].read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handler.peak.load(Ordering::SeqCst), 2);

        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        handler.release.notify_waiters();
    }

    #[tokio::test]
    async fn second_bind_on_same_port_fails() {
        let handler = Arc::new(Parking {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            release: Notify::new(),
        });
        let first = Acceptor::bind_addr("a", loopback(), 1, handler.clone()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = Acceptor::bind_addr("b", taken, 1, handler).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
