//! Plugin-extensible socket server library

pub mod config;
pub mod content;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod request;
pub mod security;
pub mod websocket;

pub use config::schema::ServerConfig;
pub use http::{PureWebSocketHandler, WebServerHandler};
pub use lifecycle::{start, Registry, RunningServer, Shutdown};
