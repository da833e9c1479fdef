//! Metrics collection and exposition.
//!
//! # Metrics
//! - `socket_server_connections_total` (counter): accepted connections by port
//! - `socket_server_requests_blocked_total` (counter): filter rejections by blocker
//! - `socket_server_request_duration_seconds` (histogram): HTTP dispatch latency
//! - `socket_server_websocket_sessions` (gauge): open WebSocket sessions
//! - `socket_server_cache_lookups_total` (counter): content cache hits and misses
//! - `socket_server_chain_nodes` (counter): chain node build results
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Prometheus exporter installed only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("socket_server_connections_total", "Connections accepted");
    describe_counter!("socket_server_requests_blocked_total", "Connections rejected by a request filter");
    describe_histogram!("socket_server_request_duration_seconds", "HTTP request handling time in seconds");
    describe_gauge!("socket_server_websocket_sessions", "Open WebSocket sessions");
    describe_counter!("socket_server_cache_lookups_total", "Content cache lookups by result");
    describe_counter!("socket_server_chain_nodes", "Chain node construction results");
}

pub fn record_connection(port: u16) {
    counter!("socket_server_connections_total", "port" => port.to_string()).increment(1);
}

pub fn record_blocked(blocker: &'static str) {
    counter!("socket_server_requests_blocked_total", "blocker" => blocker).increment(1);
}

/// Record the time spent serving one HTTP request.
pub fn record_request(method: &str, start: Instant) {
    histogram!("socket_server_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn websocket_opened() {
    gauge!("socket_server_websocket_sessions").increment(1.0);
}

pub fn websocket_closed() {
    gauge!("socket_server_websocket_sessions").decrement(1.0);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("socket_server_cache_lookups_total", "result" => result).increment(1);
}

/// Record the outcome of building one chain node (`built` or `failed`).
pub fn record_chain_node(result: &'static str) {
    counter!("socket_server_chain_nodes", "result" => result).increment(1);
}
