// WebSocket sessions for the two browser surfaces.
//
// Pages hold a long-lived session the hub pushes commands through. The panel
// session carries no data at all; its disconnection IS the signal that the
// panel closed, which triggers label cleanup on every page.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::state::AppState;

pub async fn panel_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_panel(socket, state))
}

async fn handle_panel(mut socket: WebSocket, state: Arc<AppState>) {
    info!("panel connected");

    // The panel only needs to keep the connection open; drain frames until
    // it drops.
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.coordinator.on_panel_disconnected();
}

pub async fn page_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_page(socket, state))
}

async fn handle_page(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (sender, mut commands) = mpsc::unbounded_channel();
    let page = state.hub.register_page(sender);

    let forward = tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let payload = match serde_json::to_string(&command) {
                Ok(payload) => payload,
                Err(err) => {
                    debug!(%err, "skipping unserializable command");
                    continue;
                }
            };
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => state.hub.handle_page_message(text.as_str()),
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.hub.unregister_page(page);
    forward.abort();
}
