//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use socket_server::config::{PluginConfig, SecurityConfig, ServerConfig};
use socket_server::{Registry, RunningServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A small site in a temporary directory.
pub fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>it works</h1>").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "plain notes").unwrap();
    std::fs::create_dir(dir.path().join("private")).unwrap();
    std::fs::write(dir.path().join("private").join("keys.txt"), "secret").unwrap();
    dir
}

/// One application of `class` serving `root` on an ephemeral port.
pub fn app(name: &str, class: &str, root: &Path) -> PluginConfig {
    PluginConfig {
        name: name.into(),
        class: class.into(),
        port: 0,
        public_folder: root.display().to_string(),
        threads: 2,
        ..Default::default()
    }
}

/// Configuration whose blocklists point at files that do not exist.
pub fn config(plugins: Vec<PluginConfig>, scratch: &Path) -> ServerConfig {
    ServerConfig {
        security: SecurityConfig {
            ip_blocklist: scratch.join("no-ip-rules").display().to_string(),
            url_blocklist: scratch.join("no-url-rules").display().to_string(),
            ..Default::default()
        },
        plugins,
        ..Default::default()
    }
}

pub async fn start(config: &ServerConfig, registry: Registry) -> RunningServer {
    socket_server::start(config, Arc::new(registry)).await.unwrap()
}

/// Loopback address of a running application.
pub fn addr(server: &RunningServer, name: &str) -> SocketAddr {
    let bound = server.local_addr(name).unwrap();
    SocketAddr::from(([127, 0, 0, 1], bound.port()))
}

/// Send raw request bytes and read until the server closes.
pub async fn exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

pub async fn stop(server: RunningServer) {
    server.shutdown();
    server.join(Duration::from_secs(1)).await;
}
