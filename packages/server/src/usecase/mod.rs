//! UseCase layer: frame decoding and connection lifecycle.

pub mod connect_client;
pub mod decode_frame;
pub mod disconnect_client;
pub mod error;

pub use connect_client::ConnectClientUseCase;
pub use decode_frame::{Decoded, DecodeFrameUseCase, Outcome};
pub use disconnect_client::DisconnectClientUseCase;
pub use error::ConnectError;
