//! Message store contract
//!
//! Persistence, edit/delete/read bookkeeping and "may this user post here"
//! decisions live in a remote message-store service. The gateway depends
//! only on this trait; implementations live in the infrastructure layer.

use async_trait::async_trait;
use thiserror::Error;

use super::{MessageId, RoomId, UserId};

/// Error categories reported by the message store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Room, user or message does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The user may not perform the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Anything else, including transport and pool failures
    #[error("store error: {0}")]
    Other(String),
}

/// Message store trait
///
/// Every call is an at-most-once attempt: the gateway never retries a
/// failed store call on the client's behalf.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message and return its store-assigned ID
    async fn send_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: &str,
    ) -> Result<MessageId, StoreError>;

    /// Record that `user_id` has read `message_id`
    async fn mark_read(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
    ) -> Result<(), StoreError>;

    /// Replace the content of an existing message
    async fn edit_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
        new_content: &str,
    ) -> Result<(), StoreError>;

    /// Delete an existing message
    async fn delete_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
    ) -> Result<(), StoreError>;
}
