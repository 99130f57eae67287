//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{
    infrastructure::dto::http::{HealthDto, RoomSummaryDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
    })
}

/// Rooms with at least one live connection, sorted by chat ID
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    // Domain Model から DTO への変換
    let rooms = state
        .message_pusher
        .room_stats()
        .into_iter()
        .map(|(room_id, connections)| RoomSummaryDto {
            chat_id: room_id.into_string(),
            connections,
        })
        .collect();

    Json(rooms)
}
