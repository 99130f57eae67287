//! UseCase: クライアント切断処理
//!
//! セッション終了時に一度だけ呼ばれる。レジストリからの削除は冪等なので、
//! 既に退去済み（送信キュー溢れによる evict）の接続に対しても安全に呼べる。

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, MessagePusher, RoomId},
    infrastructure::rate_limiter::RateLimiter,
};

/// クライアント切断のユースケース
pub struct DisconnectClientUseCase {
    message_pusher: Arc<dyn MessagePusher>,
    rate_limiter: Arc<RateLimiter>,
}

impl DisconnectClientUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            message_pusher,
            rate_limiter,
        }
    }

    /// Remove the connection from its room and drop its rate-limit bucket
    ///
    /// Returns `true` if the connection was still registered.
    pub fn execute(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        let removed = self.message_pusher.unregister(room_id, connection_id);
        self.rate_limiter.forget(connection_id.as_str());

        tracing::info!(
            %connection_id,
            %room_id,
            was_registered = removed,
            remaining = self.message_pusher.member_count(room_id),
            "Client disconnected"
        );
        removed
    }
}
