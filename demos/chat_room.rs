//! Chat room over WebSocket.
//!
//! The first message of a client is its name; every later message is sent to
//! all named clients as `name: text`.
//!
//! Run:
//! ```bash
//! cargo run --example chat_room
//! ```
//! then connect any WebSocket client to `ws://127.0.0.1:8090/`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use socket_server::config::{ObservabilityConfig, PluginConfig, ServerConfig};
use socket_server::observability::logging;
use socket_server::websocket::{SessionRegistry, WebSocketCallbacks, WebSocketSession, WsError};
use socket_server::{lifecycle, PureWebSocketHandler, Registry};

#[derive(Default)]
struct ChatRoom {
    members: SessionRegistry<String>,
}

impl WebSocketCallbacks for ChatRoom {
    fn on_new_connection(&self, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>> {
        Box::pin(async move { session.send("welcome, what is your name?").await })
    }

    fn on_message_received(&self, message: String, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>> {
        Box::pin(async move {
            match self.members.user_of(&session) {
                Some(name) => {
                    self.members.send_to_all(&format!("{name}: {message}")).await;
                }
                None => {
                    let name = message.trim().to_string();
                    if self.members.session_of(&name).is_some() {
                        return session.send("name taken, pick another").await;
                    }
                    self.members.add_user(Arc::clone(&session), name.clone());
                    self.members.send_to_all(&format!("{name} joined")).await;
                }
            }
            Ok(())
        })
    }

    fn on_connection_ended(&self, session: Arc<WebSocketSession>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some(name) = self.members.remove_user(&session) {
                self.members.send_to_all(&format!("{name} left")).await;
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&ObservabilityConfig::default());

    let room: Arc<dyn WebSocketCallbacks> = Arc::new(ChatRoom::default());
    let mut registry = Registry::with_builtins();
    registry.register_plugin("chat", move |ctx| {
        Box::new(PureWebSocketHandler::new(ctx).with_callbacks(Arc::clone(&room)))
    });

    let config = ServerConfig {
        plugins: vec![PluginConfig {
            name: "chat".into(),
            class: "chat".into(),
            port: 8090,
            ..Default::default()
        }],
        ..Default::default()
    };

    let server = lifecycle::start(&config, Arc::new(registry)).await?;
    lifecycle::wait_for_signal().await;
    server.shutdown();
    server.join(Duration::from_secs(2)).await;
    Ok(())
}
