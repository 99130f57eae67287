//! Value objects identifying connections, users, rooms and messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

const MAX_ID_LENGTH: usize = 128;

fn validate(field: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    if value.len() > MAX_ID_LENGTH {
        return Err(ValueObjectError::TooLong {
            field,
            len: value.len(),
            max: MAX_ID_LENGTH,
        });
    }
    Ok(())
}

/// Opaque identifier of one accepted connection, generated at accept time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh connection ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user identity, or the anonymous fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Identity assigned to connections without a verified credential
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate("user_id", &value)?;
        Ok(Self(value))
    }

    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat room identifier; scopes broadcast membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate("chat_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message identifier, either store-assigned or a client-side provisional ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Prefix clients use for optimistic, not-yet-stored messages
    pub const PROVISIONAL_PREFIX: &'static str = "temp-";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a provisional ID (`temp-<uuid>`)
    pub fn provisional() -> Self {
        Self(format!("{}{}", Self::PROVISIONAL_PREFIX, Uuid::new_v4()))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(Self::PROVISIONAL_PREFIX)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_empty() {
        // テスト項目: 空の user_id は作成できない
        // given (前提条件):
        let value = "   ".to_string();

        // when (操作):
        let result = UserId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::Empty("user_id")));
    }

    #[test]
    fn test_room_id_rejects_too_long() {
        // テスト項目: 長すぎる chat_id は作成できない
        // given (前提条件):
        let value = "r".repeat(MAX_ID_LENGTH + 1);

        // when (操作):
        let result = RoomId::new(value);

        // then (期待する結果):
        assert!(matches!(result, Err(ValueObjectError::TooLong { .. })));
    }

    #[test]
    fn test_anonymous_user() {
        // テスト項目: 匿名ユーザーが判別できる
        // given (前提条件):
        let anonymous = UserId::anonymous();
        let alice = UserId::new("alice".to_string()).unwrap();

        // then (期待する結果):
        assert!(anonymous.is_anonymous());
        assert!(!alice.is_anonymous());
    }

    #[test]
    fn test_provisional_message_id() {
        // テスト項目: temp- で始まる ID は仮 ID として扱われる
        // given (前提条件):
        let generated = MessageId::provisional();
        let stored = MessageId::new("8f14e45f");

        // then (期待する結果):
        assert!(generated.is_provisional());
        assert!(!stored.is_provisional());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        // テスト項目: 接続 ID は毎回異なる値が生成される
        // when (操作):
        let first = ConnectionId::generate();
        let second = ConnectionId::generate();

        // then (期待する結果):
        assert_ne!(first, second);
    }
}
