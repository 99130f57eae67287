//! UseCase layer errors

use thiserror::Error;

use crate::domain::{PushError, RegistryError};

/// Errors while bringing a connection into its room
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to encode connection notice: {0}")]
    Encode(String),

    #[error("failed to enqueue connection notice: {0}")]
    Notice(#[from] PushError),
}
