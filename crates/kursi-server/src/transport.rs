//! WebSocket transport built on axum.
//!
//! Each upgraded socket is split into a reader and a writer. The reader
//! forwards text frames to the driver loop as [`TransportEvent`]s; the writer
//! drains a bounded per-session queue filled by the executor. The transport
//! never touches room or seat state.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use kursi_core::env::Environment;
use tokio::sync::mpsc;

use crate::system_env::SystemEnv;

/// Frame queued for a session's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Encoded server message
    Text(Arc<str>),
    /// Close the socket with a policy-violation frame
    Close(String),
}

/// Connection lifecycle and inbound frames, in arrival order per session.
#[derive(Debug)]
pub enum TransportEvent {
    /// Socket upgraded; `outbound` feeds its writer task
    Connected {
        /// Session ID assigned to the socket
        session_id: u64,
        /// Queue drained by the writer task
        outbound: mpsc::Sender<Outbound>,
    },
    /// Text frame received
    Frame {
        /// Sending session
        session_id: u64,
        /// Raw frame text
        text: String,
    },
    /// Socket finished
    Closed {
        /// Closed session
        session_id: u64,
        /// Why the socket finished
        reason: String,
    },
}

/// Shared state handed to the upgrade handler.
#[derive(Clone)]
pub struct TransportState {
    /// Channel into the driver loop
    pub events: mpsc::Sender<TransportEvent>,
    /// Source of session IDs
    pub env: SystemEnv,
    /// Capacity of each session's outbound queue
    pub outbound_queue: usize,
}

/// Router serving the WebSocket endpoint at `/` and `/ws`.
pub fn router(state: TransportState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<TransportState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one socket until either side finishes.
async fn handle_socket(socket: WebSocket, state: TransportState) {
    let session_id = state.env.random_u64();
    let (tx, mut rx) = mpsc::channel::<Outbound>(state.outbound_queue.max(1));

    if state.events.send(TransportEvent::Connected { session_id, outbound: tx }).await.is_err() {
        tracing::warn!(session_id, "driver loop gone, dropping connection");
        return;
    }
    tracing::debug!(session_id, "websocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Text(text) => {
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        return "write failed".to_string();
                    }
                },
                Outbound::Close(reason) => {
                    let frame = CloseFrame { code: close_code::POLICY, reason: reason.clone().into() };
                    // Peer may already be gone; the close reason is what matters.
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    return reason;
                },
            }
        }
        "server closed".to_string()
    });

    let events = state.events.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(message) = ws_rx.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let event = TransportEvent::Frame { session_id, text: text.to_string() };
                    if events.send(event).await.is_err() {
                        return "server shutting down".to_string();
                    }
                },
                Ok(Message::Close(_)) => return "client disconnect".to_string(),
                // axum answers pings itself; binary frames are not part of the protocol
                Ok(_) => {},
                Err(e) => return format!("read error: {e}"),
            }
        }
        "client disconnect".to_string()
    });

    let reason = tokio::select! {
        result = &mut writer => {
            reader.abort();
            result.unwrap_or_else(|e| format!("writer task failed: {e}"))
        },
        result = &mut reader => {
            writer.abort();
            result.unwrap_or_else(|e| format!("reader task failed: {e}"))
        },
    };

    tracing::debug!(session_id, %reason, "websocket finished");
    // Driver loop may already be shut down.
    let _ = state.events.send(TransportEvent::Closed { session_id, reason }).await;
}
