//! UseCase: 受信フレームのデコードと分類
//!
//! クライアントから届いた 1 フレームを検証し、送り先を決める純粋な分類器。
//! 外部への副作用はメッセージストアの呼び出しだけで、レジストリや送信キューには
//! 触れない。Forward / Reply / Reject の振り分けは呼び出し側が行う。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DecodeFrameUseCase::execute() メソッド
//! - 種別ごとのディスパッチ、ID なりすましの拒否、ストアエラーの変換
//!
//! ### どのような状況を想定しているか
//! - 正常系：text / typing / read / edit / delete / connection_check
//! - 異常系：不正な JSON、user_id の不一致、ストアエラー、未知の種別

use std::sync::Arc;

use chatgate_shared::time::Clock;
use serde::Serialize;

use crate::{
    domain::{MessageId, MessageStore, RoomId, StoreError, UserId},
    infrastructure::dto::websocket::{
        ChatFrame, ConnectionAckFrame, ErrorCode, ErrorFrame, FrameKind,
    },
};

/// Where a decoded frame goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Broadcast to every member of the connection's room
    Forward,
    /// Send only to the originating connection
    Reply,
    /// Validation, authorization or store failure; send only to the sender
    Reject(ErrorCode),
}

/// Result of decoding one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub kind: FrameKind,
    pub outcome: Outcome,
    /// Serialized outbound JSON
    pub payload: String,
}

impl Decoded {
    fn forward(kind: FrameKind, frame: &impl Serialize) -> Self {
        Self {
            kind,
            outcome: Outcome::Forward,
            payload: encode(frame),
        }
    }

    fn reply(kind: FrameKind, frame: &impl Serialize) -> Self {
        Self {
            kind,
            outcome: Outcome::Reply,
            payload: encode(frame),
        }
    }

    fn reject(kind: FrameKind, code: ErrorCode, message: &str) -> Self {
        Self {
            kind,
            outcome: Outcome::Reject(code),
            payload: encode(&ErrorFrame::new(code, message)),
        }
    }
}

fn encode(frame: &impl Serialize) -> String {
    serde_json::to_string(frame).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize outbound frame: {}", e);
        r#"{"success":false,"error":{"code":"server_error","message":"Failed to encode response"}}"#
            .to_string()
    })
}

fn store_error_code(error: &StoreError) -> ErrorCode {
    match error {
        StoreError::NotFound(_) => ErrorCode::NotFound,
        StoreError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        StoreError::Other(_) => ErrorCode::ServerError,
    }
}

/// 受信フレームのデコードのユースケース
pub struct DecodeFrameUseCase {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl DecodeFrameUseCase {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Decode one raw text frame received on a connection
    ///
    /// # Arguments
    ///
    /// * `raw` - Frame text as received
    /// * `user_id` - The connection's resolved identity
    /// * `room_id` - The room the connection joined
    pub async fn execute(&self, raw: &str, user_id: &UserId, room_id: &RoomId) -> Decoded {
        let mut frame: ChatFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%user_id, "Malformed frame: {}", e);
                return Decoded::reject(
                    FrameKind::Unknown,
                    ErrorCode::InvalidFormat,
                    "Invalid message format",
                );
            }
        };
        let kind = frame.r#type;

        if frame.user_id.is_empty() {
            frame.user_id = user_id.as_str().to_string();
        }
        if frame.chat_id.is_empty() {
            frame.chat_id = room_id.as_str().to_string();
        }
        if frame.user_id != user_id.as_str() {
            tracing::warn!(%user_id, claimed = %frame.user_id, "User ID mismatch");
            return Decoded::reject(kind, ErrorCode::Unauthorized, "User ID mismatch");
        }
        if frame.chat_id != room_id.as_str() {
            tracing::warn!(%user_id, %room_id, claimed = %frame.chat_id, "Chat ID mismatch");
            return Decoded::reject(kind, ErrorCode::Unauthorized, "Chat ID mismatch");
        }

        if frame.timestamp.is_none() {
            frame.timestamp = Some(self.clock.now());
        }

        match kind {
            FrameKind::Text => self.text(frame, user_id, room_id).await,
            FrameKind::Typing => {
                frame.content.clear();
                Decoded::forward(kind, &frame)
            }
            FrameKind::Read => self.read(frame, user_id, room_id).await,
            FrameKind::Edit => self.edit(frame, user_id, room_id).await,
            FrameKind::Delete => self.delete(frame, user_id, room_id).await,
            FrameKind::ConnectionCheck => {
                let ack = ConnectionAckFrame::new(frame.user_id, frame.chat_id, self.clock.now());
                Decoded::reply(kind, &ack)
            }
            FrameKind::ConnectionEstablished | FrameKind::ConnectionAck | FrameKind::Unknown => {
                tracing::debug!(%user_id, kind = kind.as_str(), "Unsupported frame kind");
                Decoded::reject(kind, ErrorCode::InvalidType, "Unknown message type")
            }
        }
    }

    async fn text(&self, mut frame: ChatFrame, user_id: &UserId, room_id: &RoomId) -> Decoded {
        let kind = frame.r#type;
        let provisional = frame
            .message_id
            .take()
            .map(MessageId::new)
            .filter(MessageId::is_provisional);

        match self
            .store
            .send_message(room_id, user_id, &frame.content)
            .await
        {
            Ok(message_id) => {
                frame.message_id = Some(message_id.into_string());
                frame.original_id = provisional.map(MessageId::into_string);
                Decoded::forward(kind, &frame)
            }
            Err(e) => {
                tracing::warn!(%user_id, %room_id, "Failed to save message: {}", e);
                let message = match e {
                    StoreError::NotFound(_) => "Chat or user not found",
                    StoreError::PermissionDenied(_) => "Not allowed to send messages in this chat",
                    StoreError::Other(_) => "Failed to save message",
                };
                Decoded::reject(kind, store_error_code(&e), message)
            }
        }
    }

    async fn read(&self, mut frame: ChatFrame, user_id: &UserId, room_id: &RoomId) -> Decoded {
        let kind = frame.r#type;
        let Some(message_id) = target_message(&frame) else {
            return Decoded::reject(kind, ErrorCode::InvalidFormat, "message_id is required");
        };

        match self.store.mark_read(room_id, user_id, &message_id).await {
            Ok(()) => {
                frame.is_read = true;
                Decoded::forward(kind, &frame)
            }
            Err(e) => {
                tracing::warn!(%user_id, %message_id, "Failed to mark message as read: {}", e);
                Decoded::reject(
                    kind,
                    ErrorCode::ServerError,
                    "Failed to mark message as read",
                )
            }
        }
    }

    async fn edit(&self, mut frame: ChatFrame, user_id: &UserId, room_id: &RoomId) -> Decoded {
        let kind = frame.r#type;
        let Some(message_id) = target_message(&frame) else {
            return Decoded::reject(kind, ErrorCode::InvalidFormat, "message_id is required");
        };

        match self
            .store
            .edit_message(room_id, user_id, &message_id, &frame.content)
            .await
        {
            Ok(()) => {
                frame.is_edited = true;
                Decoded::forward(kind, &frame)
            }
            Err(e) => {
                tracing::warn!(%user_id, %message_id, "Failed to edit message: {}", e);
                let message = match e {
                    StoreError::NotFound(_) => "Message not found",
                    StoreError::PermissionDenied(_) => "Not allowed to edit this message",
                    StoreError::Other(_) => "Failed to edit message",
                };
                Decoded::reject(kind, store_error_code(&e), message)
            }
        }
    }

    async fn delete(&self, mut frame: ChatFrame, user_id: &UserId, room_id: &RoomId) -> Decoded {
        let kind = frame.r#type;
        let Some(message_id) = target_message(&frame) else {
            return Decoded::reject(kind, ErrorCode::InvalidFormat, "message_id is required");
        };

        match self
            .store
            .delete_message(room_id, user_id, &message_id)
            .await
        {
            Ok(()) => {
                frame.is_deleted = true;
                frame.content.clear();
                Decoded::forward(kind, &frame)
            }
            Err(e) => {
                tracing::warn!(%user_id, %message_id, "Failed to delete message: {}", e);
                let message = match e {
                    StoreError::NotFound(_) => "Message not found",
                    StoreError::PermissionDenied(_) => "Not allowed to delete this message",
                    StoreError::Other(_) => "Failed to delete message",
                };
                Decoded::reject(kind, store_error_code(&e), message)
            }
        }
    }
}

fn target_message(frame: &ChatFrame) -> Option<MessageId> {
    frame
        .message_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(MessageId::new)
}
