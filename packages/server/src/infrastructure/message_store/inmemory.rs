//! InMemory Message Store 実装
//!
//! ドメイン層が定義する MessageStore trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。リモートのメッセージストアが
//! 行う権限判定のうち、作成者チェックと匿名ユーザーの拒否だけを再現します。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{MessageId, MessageStore, RoomId, StoreError, UserId};

#[derive(Debug, Clone)]
struct StoredMessage {
    author: UserId,
    content: String,
    read_by: HashSet<UserId>,
}

#[derive(Debug, Default)]
struct Room {
    messages: HashMap<MessageId, StoredMessage>,
}

/// インメモリ Message Store 実装
///
/// Rooms are created on first send.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    rooms: Mutex<HashMap<RoomId, Room>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content of a stored message, if any
    pub async fn content_of(&self, room_id: &RoomId, message_id: &MessageId) -> Option<String> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)?
            .messages
            .get(message_id)
            .map(|m| m.content.clone())
    }

    /// Whether `user_id` has marked the message as read
    pub async fn is_read_by(
        &self,
        room_id: &RoomId,
        message_id: &MessageId,
        user_id: &UserId,
    ) -> bool {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .and_then(|room| room.messages.get(message_id))
            .is_some_and(|m| m.read_by.contains(user_id))
    }

    /// Number of messages currently stored in a room
    pub async fn message_count(&self, room_id: &RoomId) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).map_or(0, |room| room.messages.len())
    }
}

fn reject_anonymous(user_id: &UserId, action: &str) -> Result<(), StoreError> {
    if user_id.is_anonymous() {
        return Err(StoreError::PermissionDenied(format!(
            "anonymous users may not {action}"
        )));
    }
    Ok(())
}

fn owned_message_mut<'a>(
    rooms: &'a mut HashMap<RoomId, Room>,
    room_id: &RoomId,
    user_id: &UserId,
    message_id: &MessageId,
) -> Result<&'a mut StoredMessage, StoreError> {
    let message = rooms
        .get_mut(room_id)
        .and_then(|room| room.messages.get_mut(message_id))
        .ok_or_else(|| StoreError::NotFound(format!("message '{message_id}'")))?;
    if &message.author != user_id {
        return Err(StoreError::PermissionDenied(format!(
            "'{user_id}' is not the author of '{message_id}'"
        )));
    }
    Ok(message)
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn send_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: &str,
    ) -> Result<MessageId, StoreError> {
        reject_anonymous(user_id, "send messages")?;

        let message_id = MessageId::new(Uuid::new_v4().to_string());
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room_id.clone()).or_default().messages.insert(
            message_id.clone(),
            StoredMessage {
                author: user_id.clone(),
                content: content.to_string(),
                read_by: HashSet::new(),
            },
        );
        Ok(message_id)
    }

    async fn mark_read(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
    ) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().await;
        let message = rooms
            .get_mut(room_id)
            .and_then(|room| room.messages.get_mut(message_id))
            .ok_or_else(|| StoreError::Other(format!("unknown message '{message_id}'")))?;
        message.read_by.insert(user_id.clone());
        Ok(())
    }

    async fn edit_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
        new_content: &str,
    ) -> Result<(), StoreError> {
        reject_anonymous(user_id, "edit messages")?;

        let mut rooms = self.rooms.lock().await;
        let message = owned_message_mut(&mut rooms, room_id, user_id, message_id)?;
        message.content = new_content.to_string();
        Ok(())
    }

    async fn delete_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
    ) -> Result<(), StoreError> {
        reject_anonymous(user_id, "delete messages")?;

        let mut rooms = self.rooms.lock().await;
        owned_message_mut(&mut rooms, room_id, user_id, message_id)?;
        if let Some(room) = rooms.get_mut(room_id) {
            room.messages.remove(message_id);
        }
        Ok(())
    }
}
