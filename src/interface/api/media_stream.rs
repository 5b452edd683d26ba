//! Media stream websocket endpoint

use super::metrics_handler::{record_call_ended, record_call_started};
use super::router::AppState;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

/// Accept the telephony platform's media websocket and hand it to the bridge
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    record_call_started();

    let session = state.bridge.open_session(socket).await;

    let reason = session
        .end_reason()
        .map(|reason| reason.as_str())
        .unwrap_or("unknown");
    record_call_ended(reason);
}
