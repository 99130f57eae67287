//! Client runner with reconnection logic.

use std::time::Duration;

use crate::{
    domain::{ConnectTarget, should_attempt_reconnect},
    error::ClientError,
    session::run_client_session,
};

/// Maximum number of reconnect attempts
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Reconnect interval in seconds
const RECONNECT_INTERVAL_SECS: u64 = 5;

/// Run the chat client, reconnecting on connection loss
pub async fn run_client(target: ConnectTarget) -> Result<(), ClientError> {
    let mut reconnect_count: u32 = 0;

    loop {
        tracing::info!(
            "Attempting to connect to room '{}' at {} (attempt {}/{})",
            target.chat_id,
            target.base_url,
            reconnect_count + 1,
            MAX_RECONNECT_ATTEMPTS + 1
        );

        match run_client_session(&target).await {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                return Ok(());
            }
            Err(e) => {
                if !should_attempt_reconnect(&e, reconnect_count, MAX_RECONNECT_ATTEMPTS) {
                    tracing::error!("{}", e);
                    if reconnect_count >= MAX_RECONNECT_ATTEMPTS {
                        tracing::error!(
                            "Failed to reconnect after {} attempts. Exiting.",
                            MAX_RECONNECT_ATTEMPTS
                        );
                    }
                    return Err(e);
                }

                tracing::warn!("Connection lost: {}", e);
                reconnect_count += 1;

                tracing::info!(
                    "Reconnecting in {} seconds... (retry {}/{})",
                    RECONNECT_INTERVAL_SECS,
                    reconnect_count,
                    MAX_RECONNECT_ATTEMPTS
                );

                tokio::time::sleep(Duration::from_secs(RECONNECT_INTERVAL_SECS)).await;
            }
        }
    }
}
