//! Gateway configuration
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults ([`GatewayConfig::default`])
//! 2. An optional TOML file (`--config <path>`)
//! 3. `CHATGATE_` environment variables, `__` between section and key
//!    (e.g. `CHATGATE_SERVER__PORT=9000`, `CHATGATE_AUTH__JWT_SECRET=...`)
//!
//! Command-line flags are applied by the binary on top of the result.

use std::{collections::HashMap, path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::{message_store::PoolConfig, rate_limiter::RateLimitConfig};

pub const ENV_PREFIX: &str = "CHATGATE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub websocket: WebSocketSection,
    pub rate_limit: RateLimitSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8083,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    /// Honour `?user_id=` on the upgrade request without a credential
    pub allow_direct_identity: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            allow_direct_identity: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketSection {
    pub send_buffer_size: usize,
    pub max_message_size: usize,
    pub read_deadline_secs: u64,
    pub write_deadline_secs: u64,
    pub ping_interval_secs: u64,
}

impl Default for WebSocketSection {
    fn default() -> Self {
        Self {
            send_buffer_size: 256,
            max_message_size: 4096,
            read_deadline_secs: 60,
            write_deadline_secs: 10,
            ping_interval_secs: 54,
        }
    }
}

impl WebSocketSection {
    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub enabled: bool,
    pub capacity: f64,
    pub refill_per_second: f64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 20.0,
            refill_per_second: 10.0,
        }
    }
}

impl RateLimitSection {
    pub fn limits(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.capacity, self.refill_per_second)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    #[default]
    Memory,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub mode: StoreMode,
    pub address: String,
    pub max_idle: usize,
    pub max_open: usize,
    pub dial_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            mode: StoreMode::Memory,
            address: "127.0.0.1:9093".to_string(),
            max_idle: 5,
            max_open: 20,
            dial_timeout_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

impl StoreSection {
    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            max_idle: self.max_idle,
            max_open: self.max_open,
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl GatewayConfig {
    /// Load configuration from the optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(path, None)
    }

    /// Load configuration, reading environment variables from `env` instead of
    /// the process environment when given
    pub fn load_from(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: GatewayConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ws = &self.websocket;
        if ws.send_buffer_size == 0 {
            return Err(invalid("websocket.send_buffer_size must be > 0"));
        }
        if ws.max_message_size == 0 {
            return Err(invalid("websocket.max_message_size must be > 0"));
        }
        if ws.read_deadline_secs == 0 || ws.write_deadline_secs == 0 {
            return Err(invalid("websocket deadlines must be > 0"));
        }
        if ws.ping_interval_secs == 0 || ws.ping_interval_secs >= ws.read_deadline_secs {
            return Err(invalid(
                "websocket.ping_interval_secs must be > 0 and shorter than read_deadline_secs",
            ));
        }

        let rl = &self.rate_limit;
        if rl.enabled && (rl.capacity < 1.0 || rl.refill_per_second <= 0.0) {
            return Err(invalid(
                "rate_limit.capacity must be >= 1 and refill_per_second > 0",
            ));
        }

        let store = &self.store;
        if store.max_open == 0 {
            return Err(invalid("store.max_open must be > 0"));
        }
        if store.max_idle > store.max_open {
            return Err(invalid("store.max_idle must not exceed store.max_open"));
        }
        if store.mode == StoreMode::Remote && store.address.trim().is_empty() {
            return Err(invalid("store.address is required in remote mode"));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(invalid("auth.jwt_secret must not be empty"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_sources() {
        // テスト項目: 設定ソースがなければデフォルト値になる
        // when (操作):
        let config = GatewayConfig::load_from(None, env(&[])).unwrap();

        // then (期待する結果):
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.bind_address(), "127.0.0.1:8083");
        assert_eq!(config.websocket.send_buffer_size, 256);
        assert_eq!(config.store.mode, StoreMode::Memory);
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        // テスト項目: 環境変数でセクション内の値を上書きできる
        // given (前提条件):
        let vars = env(&[
            ("CHATGATE_SERVER__PORT", "9000"),
            ("CHATGATE_AUTH__JWT_SECRET", "s3cret"),
            ("CHATGATE_AUTH__ALLOW_DIRECT_IDENTITY", "true"),
            ("CHATGATE_STORE__MODE", "remote"),
        ]);

        // when (操作):
        let config = GatewayConfig::load_from(None, vars).unwrap();

        // then (期待する結果):
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert!(config.auth.allow_direct_identity);
        assert_eq!(config.store.mode, StoreMode::Remote);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_toml_file_is_layered_under_environment() {
        // テスト項目: TOML ファイルの値が読み込まれ、環境変数がそれより優先される
        // given (前提条件):
        let path = std::env::temp_dir().join(format!("chatgate-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[websocket]\nsend_buffer_size = 8\n\n[rate_limit]\ncapacity = 3.0\n",
        )
        .unwrap();
        let vars = env(&[("CHATGATE_RATE_LIMIT__CAPACITY", "5")]);

        // when (操作):
        let config = GatewayConfig::load_from(Some(&path), vars).unwrap();
        std::fs::remove_file(&path).unwrap();

        // then (期待する結果):
        assert_eq!(config.websocket.send_buffer_size, 8);
        assert_eq!(config.rate_limit.capacity, 5.0);
    }

    #[test]
    fn test_ping_interval_must_be_shorter_than_read_deadline() {
        // テスト項目: ping 間隔が読み取り期限以上なら検証エラーになる
        // given (前提条件):
        let mut config = GatewayConfig::default();
        config.websocket.ping_interval_secs = config.websocket.read_deadline_secs;

        // when (操作):
        let result = config.validate();

        // then (期待する結果):
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_max_idle_above_max_open_is_invalid() {
        // テスト項目: max_idle が max_open を超える設定は検証エラーになる
        // given (前提条件):
        let mut config = GatewayConfig::default();
        config.store.max_idle = 30;

        // when (操作):
        let result = config.validate();

        // then (期待する結果):
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
