use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws (and GET /)
/// WebSocket upgrade endpoint. Client identity comes from the first
/// `register` message, not from the upgrade request.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let limit = state.max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| actor::run_connection(socket, state))
}
