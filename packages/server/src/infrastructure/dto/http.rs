//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

/// Live connection count of one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub chat_id: String,
    pub connections: usize,
}

/// Health check body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
}
