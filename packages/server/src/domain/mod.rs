//! Domain layer: value objects, the message-store contract and the
//! message-pusher contract the gateway is built around.

pub mod error;
pub mod message_pusher;
pub mod message_store;
pub mod value_object;

pub use error::ValueObjectError;
pub use message_pusher::{
    BroadcastReport, ClientHandle, MessagePusher, OutboundFrame, PushError, PusherChannel,
    RegistryError,
};
pub use message_store::{MessageStore, StoreError};
pub use value_object::{ConnectionId, MessageId, RoomId, UserId};
