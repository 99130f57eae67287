//! Server state shared by every handler and session.

use std::{sync::Arc, time::Duration};

use chatgate_shared::time::{Clock, SystemClock};

use crate::{
    config::GatewayConfig,
    domain::{MessagePusher, MessageStore},
    infrastructure::{
        auth::TokenVerifier, message_pusher::ConnectionRegistry, rate_limiter::RateLimiter,
    },
    usecase::{ConnectClientUseCase, DecodeFrameUseCase, DisconnectClientUseCase},
};

/// Per-connection transport settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub send_buffer_size: usize,
    pub max_message_size: usize,
    pub read_deadline: Duration,
    pub write_deadline: Duration,
    pub ping_interval: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let ws = &config.websocket;
        Self {
            send_buffer_size: ws.send_buffer_size,
            max_message_size: ws.max_message_size,
            read_deadline: ws.read_deadline(),
            write_deadline: ws.write_deadline(),
            ping_interval: ws.ping_interval(),
        }
    }
}

/// Shared application state
pub struct AppState {
    /// ConnectClientUseCase（クライアント接続のユースケース）
    pub connect_client_usecase: Arc<ConnectClientUseCase>,
    /// DisconnectClientUseCase（クライアント切断のユースケース）
    pub disconnect_client_usecase: Arc<DisconnectClientUseCase>,
    /// DecodeFrameUseCase（受信フレームのデコードのユースケース）
    pub decode_frame_usecase: Arc<DecodeFrameUseCase>,
    /// MessagePusher（ルームへの配信の抽象化）
    pub message_pusher: Arc<dyn MessagePusher>,
    pub rate_limiter: Arc<RateLimiter>,
    pub token_verifier: Arc<TokenVerifier>,
    pub allow_direct_identity: bool,
    pub session: SessionSettings,
}

impl AppState {
    /// Wire the gateway's components from configuration and a message store
    pub fn build(config: &GatewayConfig, store: Arc<dyn MessageStore>) -> Self {
        Self::build_with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn build_with_clock(
        config: &GatewayConfig,
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let message_pusher: Arc<dyn MessagePusher> = Arc::new(ConnectionRegistry::new());
        let rate_limiter = Arc::new(if config.rate_limit.enabled {
            RateLimiter::new(config.rate_limit.limits())
        } else {
            RateLimiter::disabled()
        });

        Self {
            connect_client_usecase: Arc::new(ConnectClientUseCase::new(
                message_pusher.clone(),
                clock.clone(),
            )),
            disconnect_client_usecase: Arc::new(DisconnectClientUseCase::new(
                message_pusher.clone(),
                rate_limiter.clone(),
            )),
            decode_frame_usecase: Arc::new(DecodeFrameUseCase::new(store, clock)),
            message_pusher,
            rate_limiter,
            token_verifier: Arc::new(TokenVerifier::new(&config.auth.jwt_secret)),
            allow_direct_identity: config.auth.allow_direct_identity,
            session: SessionSettings::from_config(config),
        }
    }
}
