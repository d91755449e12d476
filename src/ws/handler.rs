//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::{ConnectionContext, run_connection};
use crate::api::caller::Caller;
use crate::app_state::AppState;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
///
/// The upgrade request must carry the `x-user-id` header; the connection
/// acts for that user for its whole lifetime.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> impl IntoResponse {
    tracing::debug!(user_id = %caller, "ws upgrade");
    let event_rx = state.event_bus.subscribe();
    let ctx = ConnectionContext {
        caller,
        invites: Arc::clone(&state.invite_service),
        sessions: Arc::clone(&state.session_service),
    };

    ws.on_upgrade(move |socket| run_connection(socket, event_rx, ctx))
}
