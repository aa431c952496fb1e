//! HTTP and WebSocket routes for the Rill server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex as TokioMutex;
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::connection::Connection;
use crate::protocol::{ClientMessage, ServerMessage};

type Sender = Arc<TokioMutex<SplitSink<WebSocket, Message>>>;

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Handle one editor connection until it closes.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sender: Sender = Arc::new(TokioMutex::new(sender));
    let mut connection = Connection::new(&state);
    tracing::debug!("Editor connected");

    // Forward every published compile result to the client.
    let mut results = connection.subscribe();
    let forward_sender = sender.clone();
    let forward_task = tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let result = results.borrow_and_update().clone();
            if !send_message(&forward_sender, &ServerMessage::Result(result)).await {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if let Some(reply) = connection.handle(msg).await {
                        send_message(&sender, &reply).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse client message: {} (input: {})", e, text);
                    send_message(
                        &sender,
                        &ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        },
                    )
                    .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    forward_task.abort();
    tracing::debug!("Editor disconnected");
}

/// Send a server message through the WebSocket. Returns `false` once the
/// socket is gone.
async fn send_message(sender: &Sender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let mut sender = sender.lock().await;
            sender.send(Message::Text(json.into())).await.is_ok()
        }
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}
