//! Per-connection client session
//!
//! `Connecting → Active → Closing → Closed`
//!
//! Once registered, the session runs two tasks that share nothing but the
//! outbound queue:
//!
//! - the inbound pump reads one frame at a time, runs it through the codec
//!   and routes the outcome (Forward to the room, Reply/Reject to itself)
//! - the outbound pump drains the queue to the socket and sends pings
//!
//! Whichever finishes first aborts the other; the session then unregisters
//! exactly once.

use std::{fmt::Display, sync::Arc, time::Duration};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{Notify, mpsc},
    time::{Instant, MissedTickBehavior, timeout},
};

use crate::{
    domain::{ClientHandle, ConnectionId, OutboundFrame, PusherChannel, RoomId, UserId},
    ui::state::{AppState, SessionSettings},
    usecase::Outcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseReason {
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("no frame received within {0:?}")]
    ReadTimeout(Duration),

    #[error("read error: {0}")]
    ReadError(String),

    #[error("write error: {0}")]
    WriteError(String),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("evicted as a slow consumer")]
    Evicted,

    #[error("outbound queue closed")]
    QueueClosed,

    #[error("pump task failed: {0}")]
    TaskFailed(String),
}

pub struct ClientSession {
    state: Arc<AppState>,
    connection_id: ConnectionId,
    user_id: UserId,
    room_id: RoomId,
    phase: SessionState,
}

impl ClientSession {
    pub fn new(state: Arc<AppState>, user_id: UserId, room_id: RoomId) -> Self {
        Self {
            state,
            connection_id: ConnectionId::generate(),
            user_id,
            room_id,
            phase: SessionState::Connecting,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            connection_id = %self.connection_id,
            from = ?self.phase,
            to = ?next,
            "Session state changed"
        );
        self.phase = next;
    }

    /// Drive the session until the connection ends
    pub async fn run(mut self, socket: WebSocket) {
        let settings = self.state.session;
        let (tx, rx) = mpsc::channel(settings.send_buffer_size);
        let evicted = Arc::new(Notify::new());
        let handle = ClientHandle::new(
            self.connection_id.clone(),
            self.user_id.clone(),
            self.room_id.clone(),
            tx.clone(),
            evicted.clone(),
        );

        if let Err(e) = self.state.connect_client_usecase.execute(handle) {
            tracing::warn!(
                connection_id = %self.connection_id,
                user_id = %self.user_id,
                room_id = %self.room_id,
                "Failed to register client: {}",
                e
            );
            self.transition(SessionState::Closed);
            return;
        }
        self.transition(SessionState::Active);

        let (mut sink, stream) = socket.split();
        let inbound = InboundPump {
            state: self.state.clone(),
            connection_id: self.connection_id.clone(),
            user_id: self.user_id.clone(),
            room_id: self.room_id.clone(),
            own_queue: tx,
        };
        let outbound = OutboundPump {
            connection_id: self.connection_id.clone(),
            queue: rx,
            evicted,
            settings,
        };

        let mut recv_task = tokio::spawn(inbound.run(stream));
        let mut send_task = tokio::spawn(async move { outbound.run(&mut sink).await });

        // If any one of the tasks completes, abort the other
        let finished = tokio::select! {
            r = &mut recv_task => { send_task.abort(); r }
            r = &mut send_task => { recv_task.abort(); r }
        };
        let reason = finished.unwrap_or_else(|e| CloseReason::TaskFailed(e.to_string()));

        self.transition(SessionState::Closing);
        tracing::info!(
            connection_id = %self.connection_id,
            user_id = %self.user_id,
            room_id = %self.room_id,
            %reason,
            "Session closing"
        );
        self.state
            .disconnect_client_usecase
            .execute(&self.room_id, &self.connection_id);
        self.transition(SessionState::Closed);
    }
}

struct InboundPump {
    state: Arc<AppState>,
    connection_id: ConnectionId,
    user_id: UserId,
    room_id: RoomId,
    own_queue: PusherChannel,
}

impl InboundPump {
    async fn run<S, E>(self, mut stream: S) -> CloseReason
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let read_deadline = self.state.session.read_deadline;
        loop {
            // Every received frame, pongs included, restarts the deadline.
            let message = match timeout(read_deadline, stream.next()).await {
                Err(_) => return CloseReason::ReadTimeout(read_deadline),
                Ok(None) => return CloseReason::PeerClosed,
                Ok(Some(Err(e))) => return CloseReason::ReadError(e.to_string()),
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => {
                    if let Err(reason) = self.handle_text(text.as_str()).await {
                        return reason;
                    }
                }
                Message::Binary(_) => {
                    tracing::debug!(connection_id = %self.connection_id, "Ignoring binary frame");
                }
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => {
                    tracing::debug!(connection_id = %self.connection_id, "Client requested close");
                    return CloseReason::PeerClosed;
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<(), CloseReason> {
        if !self.state.rate_limiter.admit(self.connection_id.as_str()) {
            tracing::warn!(
                connection_id = %self.connection_id,
                user_id = %self.user_id,
                "Rate limit exceeded, dropping frame"
            );
            return Ok(());
        }

        let decoded = self
            .state
            .decode_frame_usecase
            .execute(text, &self.user_id, &self.room_id)
            .await;
        let frame: OutboundFrame = decoded.payload.into();

        match decoded.outcome {
            Outcome::Forward => {
                let report = self.state.message_pusher.broadcast(&self.room_id, frame);
                tracing::debug!(
                    connection_id = %self.connection_id,
                    room_id = %self.room_id,
                    kind = decoded.kind.as_str(),
                    delivered = report.delivered,
                    evicted = report.evicted.len(),
                    "Broadcast frame"
                );
                Ok(())
            }
            Outcome::Reply | Outcome::Reject(_) => {
                if let Outcome::Reject(code) = decoded.outcome {
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        kind = decoded.kind.as_str(),
                        code = code.as_str(),
                        "Rejected frame"
                    );
                }
                match self.own_queue.try_send(frame) {
                    Ok(()) => Ok(()),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            connection_id = %self.connection_id,
                            "Outbound queue full, dropping direct reply"
                        );
                        Ok(())
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => Err(CloseReason::QueueClosed),
                }
            }
        }
    }
}

struct OutboundPump {
    connection_id: ConnectionId,
    queue: mpsc::Receiver<OutboundFrame>,
    evicted: Arc<Notify>,
    settings: SessionSettings,
}

impl OutboundPump {
    async fn run<K>(mut self, sink: &mut K) -> CloseReason
    where
        K: Sink<Message> + Unpin,
        K::Error: Display,
    {
        let interval = self.settings.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + interval, interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = self.queue.recv() => {
                    let Some(frame) = frame else {
                        self.close(sink, close_code::NORMAL, "").await;
                        return CloseReason::QueueClosed;
                    };
                    if let Err(reason) = self.write_batch(sink, frame).await {
                        return reason;
                    }
                }
                _ = ping.tick() => {
                    if let Err(reason) = self.write(sink, Message::Ping(Default::default())).await {
                        return reason;
                    }
                }
                _ = self.evicted.notified() => {
                    tracing::info!(connection_id = %self.connection_id, "Evicted, closing connection");
                    self.close(sink, close_code::POLICY, "slow consumer").await;
                    return CloseReason::Evicted;
                }
            }
        }
    }

    /// Write `first` and the frames queued behind it at this moment with a
    /// single flush
    async fn write_batch<K>(&mut self, sink: &mut K, first: OutboundFrame) -> Result<(), CloseReason>
    where
        K: Sink<Message> + Unpin,
        K::Error: Display,
    {
        let write_deadline = self.settings.write_deadline;
        let queue = &mut self.queue;
        let backlog = queue.len();
        let batch = async {
            sink.feed(text_message(&first)).await?;
            for _ in 0..backlog {
                let Ok(frame) = queue.try_recv() else { break };
                sink.feed(text_message(&frame)).await?;
            }
            sink.flush().await
        };
        match timeout(write_deadline, batch).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CloseReason::WriteError(e.to_string())),
            Err(_) => Err(CloseReason::WriteTimeout(write_deadline)),
        }
    }

    async fn write<K>(&self, sink: &mut K, message: Message) -> Result<(), CloseReason>
    where
        K: Sink<Message> + Unpin,
        K::Error: Display,
    {
        let write_deadline = self.settings.write_deadline;
        match timeout(write_deadline, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CloseReason::WriteError(e.to_string())),
            Err(_) => Err(CloseReason::WriteTimeout(write_deadline)),
        }
    }

    async fn close<K>(&self, sink: &mut K, code: u16, reason: &str)
    where
        K: Sink<Message> + Unpin,
        K::Error: Display,
    {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        if let Err(e) = self.write(sink, Message::Close(Some(frame))).await {
            tracing::debug!(connection_id = %self.connection_id, "Failed to send close frame: {}", e);
        }
    }
}

fn text_message(frame: &OutboundFrame) -> Message {
    Message::Text(frame.to_string().into())
}
