//! WebSocket chat frame DTOs.
//!
//! Client-to-server and server-to-client frames share one JSON object shape
//! (`ChatFrame`); lifecycle notices and error responses have their own
//! shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame kind carried in the `type` field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Text,
    Typing,
    Read,
    Edit,
    Delete,
    ConnectionCheck,
    /// Server-to-client: sent once after the connection is registered
    ConnectionEstablished,
    /// Server-to-client: reply to `connection_check`
    ConnectionAck,
    /// Missing or unrecognized `type`
    #[default]
    #[serde(other)]
    Unknown,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Text => "text",
            FrameKind::Typing => "typing",
            FrameKind::Read => "read",
            FrameKind::Edit => "edit",
            FrameKind::Delete => "delete",
            FrameKind::ConnectionCheck => "connection_check",
            FrameKind::ConnectionEstablished => "connection_established",
            FrameKind::ConnectionAck => "connection_ack",
            FrameKind::Unknown => "unknown",
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Chat frame
///
/// `user_id` and `chat_id` may be omitted by the client; the server fills
/// them from the connection's identity before validating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub r#type: FrameKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_read: bool,
    /// Server-to-client only: the client's provisional ID for a stored text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
}

/// `connection_established` notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEstablishedFrame {
    pub r#type: FrameKind,
    pub chat_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionEstablishedFrame {
    pub fn new(chat_id: String, user_id: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            r#type: FrameKind::ConnectionEstablished,
            chat_id,
            user_id,
            timestamp,
        }
    }
}

/// `connection_ack` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAckFrame {
    pub r#type: FrameKind,
    pub user_id: String,
    pub chat_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl ConnectionAckFrame {
    pub fn new(user_id: String, chat_id: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            r#type: FrameKind::ConnectionAck,
            user_id,
            chat_id,
            timestamp,
            message: "Connection established".to_string(),
        }
    }
}

/// Error codes reported in reject frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidFormat,
    Unauthorized,
    NotFound,
    PermissionDenied,
    ServerError,
    InvalidType,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFormat => "invalid_format",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "not_found",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::ServerError => "server_error",
            ErrorCode::InvalidType => "invalid_type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Reject frame: `{"success":false,"error":{"code":..,"message":..}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorFrame {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }
}

/// Any frame the server may send, for clients that need to tell them apart
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Chat(ChatFrame),
    Established(ConnectionEstablishedFrame),
    Ack(ConnectionAckFrame),
    Error(ErrorFrame),
}

impl ServerFrame {
    /// Classify a server frame by its shape and `type` field
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("success").is_some() && value.get("error").is_some() {
            return serde_json::from_value(value).map(ServerFrame::Error);
        }
        match value.get("type").and_then(|t| t.as_str()) {
            Some("connection_established") => {
                serde_json::from_value(value).map(ServerFrame::Established)
            }
            Some("connection_ack") => serde_json::from_value(value).map(ServerFrame::Ack),
            _ => serde_json::from_value(value).map(ServerFrame::Chat),
        }
    }
}
