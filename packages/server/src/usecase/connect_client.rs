//! UseCase: クライアント接続処理
//!
//! connection_established をまだ誰にも公開されていない送信キューに積んでから
//! 接続をレジストリに登録する（Connecting → Active）。登録後に届くブロード
//! キャストは必ず通知の後ろに並ぶ。

use std::sync::Arc;

use chatgate_shared::time::Clock;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ClientHandle, MessagePusher},
    infrastructure::dto::websocket::ConnectionEstablishedFrame,
};

use super::error::ConnectError;

/// クライアント接続のユースケース
pub struct ConnectClientUseCase {
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl ConnectClientUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            message_pusher,
            clock,
        }
    }

    /// Enqueue `client`'s `connection_established` notice, then register it
    ///
    /// # Returns
    ///
    /// * `Ok(DateTime<Utc>)` - 接続時刻
    /// * `Err(ConnectError)` - 通知の投入または登録に失敗
    pub fn execute(&self, client: ClientHandle) -> Result<DateTime<Utc>, ConnectError> {
        let connected_at = self.clock.now();
        let notice = ConnectionEstablishedFrame::new(
            client.room_id.as_str().to_string(),
            client.user_id.as_str().to_string(),
            connected_at,
        );
        let notice =
            serde_json::to_string(&notice).map_err(|e| ConnectError::Encode(e.to_string()))?;

        // The queue is still private here, so the notice is always first.
        client.try_push(notice.into())?;

        let room_id = client.room_id.clone();
        let connection_id = client.connection_id.clone();
        let user_id = client.user_id.clone();
        self.message_pusher.register(client)?;

        tracing::info!(
            %connection_id,
            %user_id,
            %room_id,
            members = self.message_pusher.member_count(&room_id),
            "Client connected"
        );
        Ok(connected_at)
    }
}

#[cfg(test)]
mod tests {
    use chatgate_shared::time::FixedClock;
    use tokio::sync::{Notify, mpsc};

    use super::*;
    use crate::{
        domain::{
            BroadcastReport, ConnectionId, OutboundFrame, RegistryError, RoomId, UserId,
        },
        infrastructure::message_pusher::ConnectionRegistry,
    };

    fn client(capacity: usize) -> (ClientHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = ClientHandle::new(
            ConnectionId::generate(),
            UserId::new("alice".to_string()).unwrap(),
            RoomId::new("room-1".to_string()).unwrap(),
            tx,
            Arc::new(Notify::new()),
        );
        (handle, rx)
    }

    #[test]
    fn test_connect_registers_and_enqueues_notice() {
        // テスト項目: 接続するとレジストリに登録され、connection_established が最初に届く
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let clock = Arc::new(FixedClock::from_millis(1_700_000_000_000));
        let usecase = ConnectClientUseCase::new(registry.clone(), clock);
        let (handle, mut rx) = client(4);
        let room_id = handle.room_id.clone();

        // when (操作):
        let result = usecase.execute(handle);

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(registry.member_count(&room_id), 1);
        let notice: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(notice["type"], "connection_established");
        assert_eq!(notice["chat_id"], "room-1");
        assert_eq!(notice["user_id"], "alice");
    }

    #[test]
    fn test_duplicate_connection_is_rejected() {
        // テスト項目: 同じ接続 ID の二重登録はエラーになる
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let usecase =
            ConnectClientUseCase::new(registry.clone(), Arc::new(FixedClock::from_millis(0)));
        let (handle, _rx) = client(4);
        usecase.execute(handle.clone()).unwrap();

        // when (操作):
        let result = usecase.execute(handle.clone());

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::Registry(RegistryError::DuplicateConnection(
                handle.connection_id.to_string()
            )))
        );
        assert_eq!(registry.member_count(&handle.room_id), 1);
    }

    #[test]
    fn test_closed_queue_is_never_registered() {
        // テスト項目: 送信キューが閉じていれば登録されない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let usecase =
            ConnectClientUseCase::new(registry.clone(), Arc::new(FixedClock::from_millis(0)));
        let (handle, rx) = client(4);
        drop(rx);
        let room_id = handle.room_id.clone();

        // when (操作):
        let result = usecase.execute(handle);

        // then (期待する結果):
        assert!(matches!(result, Err(ConnectError::Notice(_))));
        assert_eq!(registry.member_count(&room_id), 0);
    }

    /// Registry that delivers a room broadcast the moment a client joins
    struct BusyRoom {
        inner: ConnectionRegistry,
    }

    impl MessagePusher for BusyRoom {
        fn register(&self, client: ClientHandle) -> Result<(), RegistryError> {
            let room_id = client.room_id.clone();
            self.inner.register(client)?;
            self.inner.broadcast(&room_id, Arc::from("chatter"));
            Ok(())
        }

        fn unregister(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
            self.inner.unregister(room_id, connection_id)
        }

        fn broadcast(&self, room_id: &RoomId, frame: OutboundFrame) -> BroadcastReport {
            self.inner.broadcast(room_id, frame)
        }

        fn member_count(&self, room_id: &RoomId) -> usize {
            self.inner.member_count(room_id)
        }

        fn room_stats(&self) -> Vec<(RoomId, usize)> {
            self.inner.room_stats()
        }
    }

    #[test]
    fn test_notice_precedes_broadcast_racing_the_join() {
        // テスト項目: 登録直後に届いたブロードキャストより先に connection_established が並ぶ
        // given (前提条件):
        let pusher = Arc::new(BusyRoom {
            inner: ConnectionRegistry::new(),
        });
        let usecase =
            ConnectClientUseCase::new(pusher.clone(), Arc::new(FixedClock::from_millis(0)));
        let (handle, mut rx) = client(2);

        // when (操作):
        let result = usecase.execute(handle);

        // then (期待する結果):
        assert!(result.is_ok());
        let first: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["type"], "connection_established");
        assert_eq!(&*rx.try_recv().unwrap(), "chatter");
    }

    #[test]
    fn test_notice_first_under_concurrent_broadcasts() {
        // テスト項目: 別スレッドがブロードキャストし続けても、全クライアントの最初のフレームは
        //             connection_established になる
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let usecase =
            ConnectClientUseCase::new(registry.clone(), Arc::new(FixedClock::from_millis(0)));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let broadcaster = {
            let registry = registry.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let room_id = RoomId::new("room-1".to_string()).unwrap();
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    registry.broadcast(&room_id, Arc::from("chatter"));
                }
            })
        };

        // when (操作):
        let mut queues = Vec::new();
        for _ in 0..2000 {
            let (handle, rx) = client(4);
            let result = usecase.execute(handle.clone());
            queues.push((result, rx));
            registry.unregister(&handle.room_id, &handle.connection_id);
        }
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        broadcaster.join().unwrap();

        // then (期待する結果):
        for (result, mut rx) in queues {
            assert!(result.is_ok());
            let first: serde_json::Value =
                serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(first["type"], "connection_established");
        }
    }
}
