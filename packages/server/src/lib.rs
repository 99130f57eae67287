//! Real-time chat gateway.
//!
//! Accepts WebSocket connections per chat room, validates and classifies each
//! inbound frame, persists it through a message store and fans the result
//! out to every live connection in the room.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
