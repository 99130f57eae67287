//! In-process connection registry (the hub)
//!
//! Room membership is a map from room ID to the clients in that room. Every
//! operation runs on the caller's task and locks only the membership set of
//! the room it touches, so register, unregister and broadcast on one room are
//! atomic with respect to each other and a broadcast always sees a
//! consistent member snapshot, while other rooms proceed in parallel.
//!
//! Backpressure: a recipient whose outbound queue is full is evicted. It is
//! removed from its room and signalled to close; the broadcast moves on to
//! the remaining members without waiting.

use std::collections::HashMap;

use dashmap::{DashMap, mapref::entry::Entry};

use crate::domain::{
    BroadcastReport, ClientHandle, ConnectionId, MessagePusher, OutboundFrame, PushError,
    RegistryError, RoomId,
};

type Members = HashMap<ConnectionId, ClientHandle>;

/// Process-wide registry of live clients keyed by room
#[derive(Default)]
pub struct ConnectionRegistry {
    /// room ID -> (connection ID -> client)
    rooms: DashMap<RoomId, Members>,
    /// connection ID -> room ID, so a client is in at most one room
    index: DashMap<ConnectionId, RoomId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the room entry once its last member is gone
    fn prune(&self, room_id: &RoomId) {
        self.rooms.remove_if(room_id, |_, members| members.is_empty());
    }

    fn forget(&self, room_id: &RoomId, connection_id: &ConnectionId) {
        self.index
            .remove_if(connection_id, |_, indexed| indexed == room_id);
    }
}

impl MessagePusher for ConnectionRegistry {
    fn register(&self, client: ClientHandle) -> Result<(), RegistryError> {
        match self.index.entry(client.connection_id.clone()) {
            Entry::Occupied(_) => {
                return Err(RegistryError::DuplicateConnection(
                    client.connection_id.to_string(),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(client.room_id.clone());
            }
        }

        tracing::debug!(
            connection_id = %client.connection_id,
            user_id = %client.user_id,
            room_id = %client.room_id,
            "Client registered"
        );
        self.rooms
            .entry(client.room_id.clone())
            .or_default()
            .insert(client.connection_id.clone(), client);
        Ok(())
    }

    fn unregister(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        let removed = self
            .rooms
            .get_mut(room_id)
            .and_then(|mut members| members.remove(connection_id))
            .is_some();
        if removed {
            self.prune(room_id);
            self.forget(room_id, connection_id);
            tracing::debug!(%connection_id, %room_id, "Client unregistered");
        }
        removed
    }

    fn broadcast(&self, room_id: &RoomId, frame: OutboundFrame) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        {
            let Some(mut members) = self.rooms.get_mut(room_id) else {
                return report;
            };

            for (connection_id, client) in members.iter() {
                match client.try_push(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(PushError::QueueFull) => {
                        tracing::warn!(
                            %connection_id,
                            user_id = %client.user_id,
                            %room_id,
                            "Outbound queue full, evicting slow consumer"
                        );
                        client.evict();
                        report.evicted.push(connection_id.clone());
                    }
                    Err(PushError::Closed) => {
                        tracing::debug!(%connection_id, %room_id, "Outbound queue closed, removing client");
                        report.evicted.push(connection_id.clone());
                    }
                }
            }

            for connection_id in &report.evicted {
                members.remove(connection_id);
            }
        }

        if !report.evicted.is_empty() {
            self.prune(room_id);
            for connection_id in &report.evicted {
                self.forget(room_id, connection_id);
            }
        }

        report
    }

    fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, |members| members.len())
    }

    fn room_stats(&self) -> Vec<(RoomId, usize)> {
        let mut stats: Vec<(RoomId, usize)> = self
            .rooms
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::{Notify, mpsc};

    use super::*;
    use crate::domain::UserId;

    struct TestClient {
        handle: ClientHandle,
        rx: mpsc::Receiver<OutboundFrame>,
        evicted: Arc<Notify>,
    }

    fn create_test_client(user: &str, room: &str, capacity: usize) -> TestClient {
        let (tx, rx) = mpsc::channel(capacity);
        let evicted = Arc::new(Notify::new());
        let handle = ClientHandle::new(
            ConnectionId::generate(),
            UserId::new(user.to_string()).unwrap(),
            RoomId::new(room.to_string()).unwrap(),
            tx,
            evicted.clone(),
        );
        TestClient {
            handle,
            rx,
            evicted,
        }
    }

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member_of_room() {
        // テスト項目: ルームの全メンバーにフレームが届く
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let mut alice = create_test_client("alice", "room-a", 8);
        let mut bob = create_test_client("bob", "room-a", 8);
        registry.register(alice.handle.clone()).unwrap();
        registry.register(bob.handle.clone()).unwrap();

        // when (操作):
        let report = registry.broadcast(&room("room-a"), Arc::from("hello"));

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        assert!(report.evicted.is_empty());
        assert_eq!(alice.rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(bob.rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_broadcast_never_crosses_rooms() {
        // テスト項目: 別ルーム宛てのブロードキャストは受信しない
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let mut alice = create_test_client("alice", "room-a", 8);
        let mut bob = create_test_client("bob", "room-b", 8);
        registry.register(alice.handle.clone()).unwrap();
        registry.register(bob.handle.clone()).unwrap();

        // when (操作):
        registry.broadcast(&room("room-b"), Arc::from("for b"));

        // then (期待する結果):
        assert!(alice.rx.try_recv().is_err());
        assert_eq!(bob.rx.recv().await.as_deref(), Some("for b"));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        // テスト項目: 2 回目の unregister は何もしない
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let alice = create_test_client("alice", "room-a", 8);
        let bob = create_test_client("bob", "room-a", 8);
        registry.register(alice.handle.clone()).unwrap();
        registry.register(bob.handle.clone()).unwrap();

        // when (操作):
        let first = registry.unregister(&room("room-a"), &alice.handle.connection_id);
        let count_after_first = registry.member_count(&room("room-a"));
        let second = registry.unregister(&room("room-a"), &alice.handle.connection_id);

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert_eq!(count_after_first, 1);
        assert_eq!(registry.member_count(&room("room-a")), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        // テスト項目: 同じ接続 ID の二重登録はエラーになる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let alice = create_test_client("alice", "room-a", 8);
        registry.register(alice.handle.clone()).unwrap();

        // when (操作):
        let result = registry.register(alice.handle.clone());

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateConnection(_))
        ));
        assert_eq!(registry.member_count(&room("room-a")), 1);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_evicted_without_blocking_others() {
        // テスト項目: キューが満杯の受信者は切断対象となり、他の受信者への配信は続く
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let slow = create_test_client("slow", "room-a", 1);
        let mut fast = create_test_client("fast", "room-a", 8);
        registry.register(slow.handle.clone()).unwrap();
        registry.register(fast.handle.clone()).unwrap();
        registry.broadcast(&room("room-a"), Arc::from("first"));

        // when (操作):
        let report = registry.broadcast(&room("room-a"), Arc::from("second"));

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, vec![slow.handle.connection_id.clone()]);
        assert_eq!(registry.member_count(&room("room-a")), 1);
        assert_eq!(fast.rx.recv().await.as_deref(), Some("first"));
        assert_eq!(fast.rx.recv().await.as_deref(), Some("second"));
        tokio::time::timeout(Duration::from_secs(1), slow.evicted.notified())
            .await
            .expect("slow consumer should be signalled");
    }

    #[test]
    fn test_closed_queue_is_removed() {
        // テスト項目: 受信側が閉じたクライアントはブロードキャスト時に削除される
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let gone = create_test_client("gone", "room-a", 8);
        registry.register(gone.handle.clone()).unwrap();
        drop(gone.rx);

        // when (操作):
        let report = registry.broadcast(&room("room-a"), Arc::from("anyone?"));

        // then (期待する結果):
        assert_eq!(report.delivered, 0);
        assert_eq!(report.evicted.len(), 1);
        assert_eq!(registry.member_count(&room("room-a")), 0);
    }

    #[test]
    fn test_room_stats_sorted_by_room() {
        // テスト項目: ルームごとの接続数がルーム ID 順に取得できる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        for (user, room_id) in [("a", "room-b"), ("b", "room-a"), ("c", "room-b")] {
            registry
                .register(create_test_client(user, room_id, 8).handle)
                .unwrap();
        }

        // when (操作):
        let stats = registry.room_stats();

        // then (期待する結果):
        assert_eq!(stats, vec![(room("room-a"), 1), (room("room-b"), 2)]);
    }

    #[test]
    fn test_broadcast_to_empty_room() {
        // テスト項目: メンバーのいないルームへのブロードキャストはエラーにならない
        // given (前提条件):
        let registry = ConnectionRegistry::new();

        // when (操作):
        let report = registry.broadcast(&room("nobody"), Arc::from("echo"));

        // then (期待する結果):
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn test_concurrent_membership_changes_stay_consistent() {
        // テスト項目: 複数スレッドから同時に登録・解除・ブロードキャストしても
        //             メンバー集合が壊れず、他ルームのフレームも届かない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms: [&'static str; 3] = ["room-a", "room-b", "room-c"];
        let per_room = 200;

        // when (操作):
        let members: Vec<std::thread::JoinHandle<Vec<TestClient>>> = rooms
            .iter()
            .enumerate()
            .map(|(i, &room_id)| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut kept = Vec::new();
                    for n in 0..per_room {
                        let client =
                            create_test_client(&format!("user-{i}-{n}"), room_id, 1024);
                        registry.register(client.handle.clone()).unwrap();
                        if n % 2 == 0 {
                            assert!(registry.unregister(&room(room_id), &client.handle.connection_id));
                        } else {
                            kept.push(client);
                        }
                    }
                    kept
                })
            })
            .collect();
        let broadcasters: Vec<std::thread::JoinHandle<()>> = rooms
            .iter()
            .map(|&room_id| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_room {
                        let report = registry.broadcast(&room(room_id), Arc::from(room_id));
                        assert!(report.evicted.is_empty());
                    }
                })
            })
            .collect();
        for broadcaster in broadcasters {
            broadcaster.join().unwrap();
        }
        let mut kept: Vec<(&str, TestClient)> = Vec::new();
        for (room_id, handle) in rooms.iter().zip(members) {
            kept.extend(handle.join().unwrap().into_iter().map(|c| (*room_id, c)));
        }

        // then (期待する結果):
        for room_id in rooms {
            assert_eq!(registry.member_count(&room(room_id)), per_room / 2);
        }
        for (room_id, client) in &mut kept {
            while let Ok(frame) = client.rx.try_recv() {
                assert_eq!(&*frame, *room_id);
            }
        }
        for (room_id, client) in &kept {
            assert!(registry.unregister(&room(room_id), &client.handle.connection_id));
        }
        assert!(registry.room_stats().is_empty());
        assert!(registry.index.is_empty());
    }
}
