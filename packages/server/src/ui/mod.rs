//! UI layer: axum router, handlers and the per-connection session.

pub mod handler;
pub mod identity;
pub mod server;
pub mod session;
pub mod signal;
pub mod state;

pub use server::Server;
pub use state::{AppState, SessionSettings};
