//! # WebSocket Handlers
//!
//! Studios connect to `GET /ws`. Each connection gets an ID in the registry
//! and an outbound task that writes queued requests; inbound text frames
//! are read as responses and logged.

use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use remote_protocol::Response;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ─── WebSocket Upgrade Endpoint ─────────────────────────────────

/// `GET /ws` — upgrades a studio connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, peer, state))
}

// ─── Connection Lifecycle ───────────────────────────────────────

/// 1. Register the studio with a fresh outbound queue
/// 2. Spawn the writer for that queue
/// 3. Log responses until the socket closes
/// 4. Unregister
async fn handle_connection(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let studio_id = state.register_studio(tx, peer);
    info!("Studio {} connected from {}", studio_id, peer);

    // ── Outbound Task ──
    let outbound_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // ── Inbound Loop ──
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => handle_text(&state, &studio_id, &text),
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("Studio {} disconnected", studio_id);
    outbound_task.abort();
    state.studios.remove(&studio_id);
}

/// Logs a studio's response. Anything else is ignored.
pub fn handle_text(state: &AppState, studio_id: &str, text: &str) {
    match Response::decode(text) {
        Ok(Some(response)) => {
            match &response.fpath {
                Some(fpath) => info!("{} → {} ({})", studio_id, response.action, fpath),
                None => info!("{} → {}", studio_id, response.action),
            }
            state.record_response(studio_id, response);
        }
        Ok(None) => debug!("Ignoring non-response message from {}", studio_id),
        Err(e) => warn!("Unreadable message from {}: {}", studio_id, e),
    }
}
