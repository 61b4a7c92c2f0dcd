//! WebSocket endpoint pushing newly generated reports to dashboard viewers.
//!
//! Each connection subscribes to the report broadcaster once at upgrade
//! time and receives a `report_generated` event per published report for
//! the life of the connection. No acknowledgment is expected from the
//! client; a viewer that falls too far behind lags and misses reports
//! rather than slowing anyone else down.

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};

use crate::{broadcast::ReportEvent, AppState};

/// Build the WebSocket Router scoped under `/api/ws`.
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/", get(ws_handler))
}

/// Upgrade handler for GET /api/ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no report published during
    // the handshake is missed.
    let rx = state.broadcaster.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<ReportEvent>,
) {
    debug!("websocket viewer connected");
    let (mut ws_write, mut ws_read) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            error!(error = %e, "failed to serialize report event");
                            continue;
                        }
                    };
                    if ws_write.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "viewer lagged behind report broadcast; skipping missed reports");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = ws_read.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Ignore client chatter; pings are answered by axum.
                }
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read failed");
                    break;
                }
            },
        }
    }

    // Dropping the receiver unsubscribes this viewer.
    debug!("websocket viewer disconnected");
}
