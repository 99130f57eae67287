//! Domain logic for client-side operations.
//!
//! Pure functions for the reconnect policy and for building the connect
//! URL, kept free of I/O so they are easy to test.

use crate::error::ClientError;

/// How the client identifies itself to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    /// Signed token, sent as `Authorization: Bearer <token>`
    Token(String),
    /// Unverified `?user_id=`; only honored by gateways in development mode
    Direct(String),
    Anonymous,
}

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Gateway base URL, e.g. `ws://127.0.0.1:8083`
    pub base_url: String,
    pub chat_id: String,
    pub identity: ClientIdentity,
}

impl ConnectTarget {
    pub fn new(base_url: impl Into<String>, chat_id: impl Into<String>, identity: ClientIdentity) -> Self {
        Self {
            base_url: base_url.into(),
            chat_id: chat_id.into(),
            identity,
        }
    }

    /// Full WebSocket URL for the room endpoint
    pub fn connect_url(&self) -> Result<String, ClientError> {
        if self.chat_id.trim().is_empty() {
            return Err(ClientError::InvalidOptions("chat id must not be empty".to_string()));
        }
        if !(self.base_url.starts_with("ws://") || self.base_url.starts_with("wss://")) {
            return Err(ClientError::InvalidOptions(format!(
                "url must start with ws:// or wss://: {}",
                self.base_url
            )));
        }

        let base = self.base_url.trim_end_matches('/');
        let mut url = format!("{}/api/v1/chats/{}/ws", base, urlencoding::encode(&self.chat_id));
        if let ClientIdentity::Direct(user_id) = &self.identity {
            url.push_str("?user_id=");
            url.push_str(&urlencoding::encode(user_id));
        }
        Ok(url)
    }

    /// Bearer token to attach to the handshake, if any
    pub fn bearer_token(&self) -> Option<&str> {
        match &self.identity {
            ClientIdentity::Token(token) => Some(token),
            _ => None,
        }
    }
}

/// Check if the client should exit immediately based on the error type.
///
/// A refused handshake will be refused again, and bad options never fix
/// themselves.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::Rejected(_) | ClientError::InvalidOptions(_)
    )
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_exit_immediately_when_rejected() {
        // テスト項目: ハンドシェイクが拒否された場合、即座に終了すべきと判定される
        // given (前提条件):
        let error = ClientError::Rejected(400);

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_not_exit_immediately_on_connection_error() {
        // テスト項目: 接続エラーの場合、即座には終了しないと判定される
        // given (前提条件):
        let error = ClientError::ConnectionError("Connection lost".to_string());

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 試行回数が上限未満なら再接続すべきと判定される
        // given (前提条件):
        let error = ClientError::ConnectionError("Connection lost".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 4, 5);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_not_attempt_reconnect_at_limit() {
        // テスト項目: 試行回数が上限に達したら再接続しないと判定される
        // given (前提条件):
        let error = ClientError::ConnectionError("Connection lost".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 5, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_not_attempt_reconnect_when_rejected() {
        // テスト項目: 拒否された場合は試行回数に関わらず再接続しない
        // given (前提条件):
        let error = ClientError::Rejected(403);

        // when (操作):
        let result = should_attempt_reconnect(&error, 0, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_connect_url_with_direct_identity() {
        // テスト項目: 直接指定の user_id はクエリに付与される
        // given (前提条件):
        let target = ConnectTarget::new(
            "ws://127.0.0.1:8083/",
            "room-1",
            ClientIdentity::Direct("alice".to_string()),
        );

        // when (操作):
        let url = target.connect_url().unwrap();

        // then (期待する結果):
        assert_eq!(url, "ws://127.0.0.1:8083/api/v1/chats/room-1/ws?user_id=alice");
        assert!(target.bearer_token().is_none());
    }

    #[test]
    fn test_connect_url_with_token_keeps_token_out_of_url() {
        // テスト項目: トークンは URL ではなく Authorization ヘッダで送られる
        // given (前提条件):
        let target = ConnectTarget::new(
            "ws://localhost:8083",
            "room-1",
            ClientIdentity::Token("abc.def.ghi".to_string()),
        );

        // when (操作):
        let url = target.connect_url().unwrap();

        // then (期待する結果):
        assert_eq!(url, "ws://localhost:8083/api/v1/chats/room-1/ws");
        assert_eq!(target.bearer_token(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_connect_url_encodes_reserved_characters() {
        // テスト項目: 予約文字を含む chat_id と user_id はパーセントエンコードされる
        // given (前提条件):
        let target = ConnectTarget::new(
            "ws://localhost:8083",
            "team room/1",
            ClientIdentity::Direct("a&b".to_string()),
        );

        // when (操作):
        let url = target.connect_url().unwrap();

        // then (期待する結果):
        assert_eq!(
            url,
            "ws://localhost:8083/api/v1/chats/team%20room%2F1/ws?user_id=a%26b"
        );
    }

    #[test]
    fn test_connect_url_rejects_bad_options() {
        // テスト項目: 空の chat_id や ws 以外のスキームはエラーになる
        // given (前提条件):
        let empty_chat = ConnectTarget::new("ws://localhost:8083", " ", ClientIdentity::Anonymous);
        let http_url = ConnectTarget::new("http://localhost:8083", "room-1", ClientIdentity::Anonymous);

        // when (操作):
        let empty_result = empty_chat.connect_url();
        let http_result = http_url.connect_url();

        // then (期待する結果):
        assert!(matches!(empty_result, Err(ClientError::InvalidOptions(_))));
        assert!(matches!(http_result, Err(ClientError::InvalidOptions(_))));
    }

    #[test]
    fn test_connect_url_encodes_non_ascii_as_utf8() {
        // テスト項目: 非 ASCII の user_id は UTF-8 バイト列としてエンコードされる
        // given (前提条件):
        let target = ConnectTarget::new(
            "ws://localhost:8083",
            "café",
            ClientIdentity::Direct("José".to_string()),
        );

        // when (操作):
        let url = target.connect_url().unwrap();

        // then (期待する結果):
        assert_eq!(
            url,
            "ws://localhost:8083/api/v1/chats/caf%C3%A9/ws?user_id=Jos%C3%A9"
        );
    }
}
