//! Infrastructure layer: wire DTOs, the connection registry, the rate
//! limiter, token verification and message-store clients.

pub mod auth;
pub mod dto;
pub mod message_pusher;
pub mod message_store;
pub mod rate_limiter;
