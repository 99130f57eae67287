//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, ws::WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    domain::RoomId,
    ui::{
        identity::{ConnectQuery, resolve_identity},
        session::ClientSession,
        state::AppState,
    },
};

/// `GET /api/v1/chats/{chat_id}/ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> RoomId (Domain Model)
    let room_id = match RoomId::new(chat_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejecting upgrade with invalid chat_id: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let identity = resolve_identity(
        &headers,
        &query,
        &state.token_verifier,
        state.allow_direct_identity,
    );
    tracing::info!(
        user_id = %identity.user_id,
        source = ?identity.source,
        %room_id,
        "WebSocket connection request"
    );

    let max_message_size = state.session.max_message_size;
    Ok(ws
        .max_message_size(max_message_size)
        .max_frame_size(max_message_size)
        .on_upgrade(move |socket| {
            ClientSession::new(state, identity.user_id, room_id).run(socket)
        }))
}
