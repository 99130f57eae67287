//! Client of the remote message-store service

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::domain::{MessageId, MessageStore, RoomId, StoreError, UserId};

use super::{
    link::{FailureCategory, StoreOp, StoreRequest, StoreResponse, TcpDialer},
    pool::{ConnectionPool, Dialer, StoreLink},
};

/// Message store backed by pooled links to the message-store service
///
/// Pool and transport failures surface as [`StoreError::Other`]. A link that
/// fails mid-request is closed instead of going back to the pool.
pub struct RemoteMessageStore<D: Dialer = TcpDialer> {
    pool: Arc<ConnectionPool<D>>,
    request_timeout: Duration,
}

impl<D: Dialer> RemoteMessageStore<D> {
    pub fn new(pool: Arc<ConnectionPool<D>>, request_timeout: Duration) -> Self {
        Self {
            pool,
            request_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<D>> {
        &self.pool
    }

    async fn call(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let mut link = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let outcome = tokio::time::timeout(self.request_timeout, link.call(&request)).await;
        match outcome {
            Ok(Ok(response)) => {
                self.pool.release(link);
                Ok(response)
            }
            Ok(Err(e)) => {
                tracing::warn!(op = ?request.op, "Message store request failed: {}", e);
                Err(StoreError::Other(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(op = ?request.op, "Message store request timed out");
                Err(StoreError::Other(format!(
                    "message store did not answer within {:?}",
                    self.request_timeout
                )))
            }
        }
    }

    async fn call_checked(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let response = self.call(request).await?;
        if response.ok {
            return Ok(response);
        }
        let Some(failure) = response.error else {
            return Err(StoreError::Other("request rejected without reason".to_string()));
        };
        Err(match failure.category {
            FailureCategory::NotFound => StoreError::NotFound(failure.message),
            FailureCategory::PermissionDenied => StoreError::PermissionDenied(failure.message),
            FailureCategory::Other => StoreError::Other(failure.message),
        })
    }
}

fn request(
    op: StoreOp,
    room_id: &RoomId,
    user_id: &UserId,
    message_id: Option<&MessageId>,
    content: Option<&str>,
) -> StoreRequest {
    StoreRequest {
        op,
        chat_id: room_id.as_str().to_string(),
        user_id: user_id.as_str().to_string(),
        message_id: message_id.map(|id| id.as_str().to_string()),
        content: content.map(str::to_string),
    }
}

#[async_trait]
impl<D: Dialer> MessageStore for RemoteMessageStore<D> {
    async fn send_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        content: &str,
    ) -> Result<MessageId, StoreError> {
        let response = self
            .call_checked(request(
                StoreOp::SendMessage,
                room_id,
                user_id,
                None,
                Some(content),
            ))
            .await?;
        match response.message_id {
            Some(id) if !id.is_empty() => Ok(MessageId::new(id)),
            _ => Err(StoreError::Other(
                "message store returned no message id".to_string(),
            )),
        }
    }

    async fn mark_read(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
    ) -> Result<(), StoreError> {
        self.call_checked(request(
            StoreOp::MarkRead,
            room_id,
            user_id,
            Some(message_id),
            None,
        ))
        .await
        .map(drop)
    }

    async fn edit_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
        new_content: &str,
    ) -> Result<(), StoreError> {
        self.call_checked(request(
            StoreOp::EditMessage,
            room_id,
            user_id,
            Some(message_id),
            Some(new_content),
        ))
        .await
        .map(drop)
    }

    async fn delete_message(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        message_id: &MessageId,
    ) -> Result<(), StoreError> {
        self.call_checked(request(
            StoreOp::DeleteMessage,
            room_id,
            user_id,
            Some(message_id),
            None,
        ))
        .await
        .map(drop)
    }
}
