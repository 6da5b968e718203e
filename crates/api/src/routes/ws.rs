use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use common::BotEvent;

use crate::auth::{token_matches, unauthorized};
use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/events", get(ws_events_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket endpoint that streams operator notifications as JSON.
/// Auth via query param `?token=<DASHBOARD_TOKEN>` (header auth not supported
/// in browser WebSocket API).
async fn ws_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    match q.token.as_deref() {
        Some(token) if token_matches(&state.dashboard_token, token) => {}
        Some(_) => return unauthorized("dashboard token does not match"),
        None => return unauthorized("missing 'token' query parameter"),
    }

    let event_rx = state.engine.subscribe_events();
    ws.on_upgrade(move |socket| handle_ws(socket, event_rx))
}

async fn handle_ws(mut socket: WebSocket, mut event_rx: broadcast::Receiver<BotEvent>) {
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                let payload = serde_json::json!({
                    "level": if event.is_error() { "error" } else { "success" },
                    "message": event.to_string(),
                    "event": event,
                });
                if socket.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket event client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
