//! Data Transfer Objects (DTOs) for external communication.
//!
//! - `websocket`: chat frames exchanged over the WebSocket connection
//! - `http`: HTTP API response bodies

pub mod http;
pub mod websocket;
