//! Error types for the chat client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The gateway refused the WebSocket handshake
    #[error("Connection rejected by gateway (HTTP {0})")]
    Rejected(u16),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The connect request could not be built from the given options
    #[error("Invalid connection options: {0}")]
    InvalidOptions(String),

    /// An input line starting with `/` did not match any command
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}
