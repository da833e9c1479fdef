//! End-to-end WebSocket tests using a real client.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use socket_server::websocket::{listener::GREETING, WebSocketCallbacks, WebSocketSession, WsError};
use socket_server::{PureWebSocketHandler, Registry, WebServerHandler};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

mod common;

#[derive(Debug, PartialEq)]
enum Event {
    Opened,
    Message(String),
    Ended,
}

/// Forwards every callback to the test and echoes messages back.
struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl WebSocketCallbacks for Recorder {
    fn on_new_connection(&self, _session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>> {
        Box::pin(async move {
            let _ = self.events.send(Event::Opened);
            Ok(())
        })
    }

    fn on_message_received(&self, message: String, session: Arc<WebSocketSession>) -> BoxFuture<'_, Result<(), WsError>> {
        Box::pin(async move {
            session.send(&message.to_uppercase()).await?;
            let _ = self.events.send(Event::Message(message));
            Ok(())
        })
    }

    fn on_connection_ended(&self, _session: Arc<WebSocketSession>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.events.send(Event::Ended);
        })
    }
}

async fn next(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn ping_then_close_yields_one_message_and_one_end() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let callbacks: Arc<dyn WebSocketCallbacks> = Arc::new(Recorder { events: tx });

    let mut registry = Registry::with_builtins();
    registry.register_plugin("web", move |ctx| {
        Box::new(WebServerHandler::new(ctx).with_callbacks(Arc::clone(&callbacks)))
    });

    let site = common::site();
    let config = common::config(vec![common::app("site", "web", site.path())], site.path());
    let server = common::start(&config, registry).await;
    let addr = common::addr(&server, "site");

    let (mut ws, response) = tokio_tungstenite::connect_async(format!("ws://{addr}/chat")).await.unwrap();
    assert_eq!(response.status(), 101);
    assert_eq!(next(&mut events).await, Event::Opened);

    ws.send(Message::text("ping")).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply, Message::text("PING"));
    assert_eq!(next(&mut events).await, Event::Message("ping".into()));

    ws.close(None).await.unwrap();
    assert_eq!(next(&mut events).await, Event::Ended);
    // Nothing after the end callback.
    assert!(tokio::time::timeout(Duration::from_millis(200), events.recv()).await.is_err());

    common::stop(server).await;
}

#[tokio::test]
async fn pure_websocket_app_greets_clients() {
    let site = common::site();
    let config = common::config(vec![common::app("chat", "websocket", site.path())], site.path());
    let server = common::start(&config, Registry::with_builtins()).await;
    let addr = common::addr(&server, "chat");

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await.unwrap();
    let greeting = tokio::time::timeout(Duration::from_secs(5), ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(greeting, Message::text(GREETING));

    let plain = common::exchange(addr, "GET /index.html HTTP/1.1\r\n\r\n").await;
    assert!(plain.is_empty());

    common::stop(server).await;
}

#[tokio::test]
async fn custom_websocket_plugin_can_be_registered() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let callbacks: Arc<dyn WebSocketCallbacks> = Arc::new(Recorder { events: tx });

    let mut registry = Registry::new();
    registry.register_plugin("echo", move |ctx| {
        Box::new(PureWebSocketHandler::new(ctx).with_callbacks(Arc::clone(&callbacks)))
    });

    let site = common::site();
    let config = common::config(vec![common::app("echo", "echo", site.path())], site.path());
    let server = common::start(&config, registry).await;
    let addr = common::addr(&server, "echo");

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await.unwrap();
    assert_eq!(next(&mut events).await, Event::Opened);
    ws.send(Message::text("hello")).await.unwrap();
    assert_eq!(next(&mut events).await, Event::Message("hello".into()));
    drop(ws);
    assert_eq!(next(&mut events).await, Event::Ended);

    common::stop(server).await;
}
