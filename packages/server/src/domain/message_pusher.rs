//! Message pusher contract
//!
//! The pusher owns room membership: which live connections exist and which
//! room each belongs to. It fans frames out to a room without ever blocking
//! on a slow recipient.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Notify, mpsc};

use super::{ConnectionId, RoomId, UserId};

/// One serialized outbound frame, shared between all recipients of a broadcast
pub type OutboundFrame = Arc<str>;

/// Sending half of a client's bounded outbound queue
pub type PusherChannel = mpsc::Sender<OutboundFrame>;

/// Registry-side view of a live client
///
/// Holds no ownership of the connection itself: only the queue sender and
/// the eviction signal observed by the client's outbound pump.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub room_id: RoomId,
    sender: PusherChannel,
    evicted: Arc<Notify>,
}

impl ClientHandle {
    pub fn new(
        connection_id: ConnectionId,
        user_id: UserId,
        room_id: RoomId,
        sender: PusherChannel,
        evicted: Arc<Notify>,
    ) -> Self {
        Self {
            connection_id,
            user_id,
            room_id,
            sender,
            evicted,
        }
    }

    /// Non-blocking enqueue onto the client's outbound queue
    pub fn try_push(&self, frame: OutboundFrame) -> Result<(), PushError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Ask the client's outbound pump to close the connection
    pub fn evict(&self) {
        self.evicted.notify_one();
    }
}

/// Why a frame could not be enqueued for one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("outbound queue is closed")]
    Closed,
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The connection ID is already registered
    #[error("connection '{0}' is already registered")]
    DuplicateConnection(String),
}

/// Result of one broadcast call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the frame was enqueued for
    pub delivered: usize,
    /// Recipients removed because their queue was saturated or closed
    pub evicted: Vec<ConnectionId>,
}

/// Message pusher trait
///
/// All three operations are atomic with respect to each other.
pub trait MessagePusher: Send + Sync {
    /// Add a client to its room
    fn register(&self, client: ClientHandle) -> Result<(), RegistryError>;

    /// Remove a client from its room; returns `false` if it was not registered
    fn unregister(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool;

    /// Enqueue a frame for every member of `room_id`
    fn broadcast(&self, room_id: &RoomId, frame: OutboundFrame) -> BroadcastReport;

    /// Number of clients currently registered in `room_id`
    fn member_count(&self, room_id: &RoomId) -> usize;

    /// Member counts of every non-empty room, sorted by room ID
    fn room_stats(&self) -> Vec<(RoomId, usize)>;
}
