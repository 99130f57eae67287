//! Connection identity resolution
//!
//! Priority order:
//!
//! 1. `?user_id=` on the upgrade request (only when direct identity is allowed)
//! 2. `Authorization: Bearer <token>` header
//! 3. `?token=<token>` query parameter, for clients that cannot set headers
//!    on the upgrade request
//!
//! The first credential found is the only one verified. A missing or invalid
//! credential yields the anonymous identity; the connection is not refused.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use serde::Deserialize;

use crate::{domain::UserId, infrastructure::auth::TokenVerifier};

/// Query parameters accepted on the upgrade request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

/// How the connection's identity was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Direct,
    Header,
    Query,
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub source: IdentitySource,
}

impl Identity {
    fn anonymous() -> Self {
        Self {
            user_id: UserId::anonymous(),
            source: IdentitySource::Anonymous,
        }
    }
}

/// Resolve the identity of an upgrade request
pub fn resolve_identity(
    headers: &HeaderMap,
    query: &ConnectQuery,
    verifier: &TokenVerifier,
    allow_direct: bool,
) -> Identity {
    if let Some(direct) = query.user_id.as_deref().filter(|s| !s.is_empty()) {
        if allow_direct {
            match UserId::new(direct.to_string()) {
                Ok(user_id) => {
                    tracing::info!(%user_id, "Using directly provided user_id");
                    return Identity {
                        user_id,
                        source: IdentitySource::Direct,
                    };
                }
                Err(e) => tracing::warn!("Ignoring invalid direct user_id: {}", e),
            }
        } else {
            tracing::warn!("Direct user_id is disabled, ignoring it");
        }
    }

    let (token, source) = match bearer_from_header(headers) {
        Some(token) => (token, IdentitySource::Header),
        None => match query.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::debug!(
                    prefix = %token_prefix(token),
                    len = token.len(),
                    "Token taken from query parameter"
                );
                (token, IdentitySource::Query)
            }
            None => {
                tracing::debug!("No credential presented, using anonymous user");
                return Identity::anonymous();
            }
        },
    };

    let claims = match verifier.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(source = ?source, "Invalid token: {}", e);
            return Identity::anonymous();
        }
    };
    match UserId::new(claims.sub) {
        Ok(user_id) => {
            tracing::info!(%user_id, source = ?source, "Authenticated connection");
            Identity { user_id, source }
        }
        Err(e) => {
            tracing::warn!("Token subject is not a valid user_id: {}", e);
            Identity::anonymous()
        }
    }
}

fn bearer_from_header(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(12)
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::Duration;

    use super::*;

    const SECRET: &str = "test-secret";

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(SECRET)
    }

    fn token(sub: &str) -> String {
        verifier().issue(sub, Duration::hours(1)).unwrap()
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_direct_user_id_wins_when_allowed() {
        // テスト項目: 許可されていれば user_id パラメータが最優先される
        // given (前提条件):
        let headers = headers_with(&token("bob"));
        let query = ConnectQuery {
            user_id: Some("alice".to_string()),
            token: None,
        };

        // when (操作):
        let identity = resolve_identity(&headers, &query, &verifier(), true);

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "alice");
        assert_eq!(identity.source, IdentitySource::Direct);
    }

    #[test]
    fn test_direct_user_id_ignored_when_disallowed() {
        // テスト項目: 許可されていなければ user_id パラメータは無視され、トークンが使われる
        // given (前提条件):
        let headers = headers_with(&token("bob"));
        let query = ConnectQuery {
            user_id: Some("alice".to_string()),
            token: None,
        };

        // when (操作):
        let identity = resolve_identity(&headers, &query, &verifier(), false);

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "bob");
        assert_eq!(identity.source, IdentitySource::Header);
    }

    #[test]
    fn test_header_takes_priority_over_query() {
        // テスト項目: ヘッダーのトークンがクエリのトークンより優先される
        // given (前提条件):
        let headers = headers_with(&token("bob"));
        let query = ConnectQuery {
            user_id: None,
            token: Some(token("carol")),
        };

        // when (操作):
        let identity = resolve_identity(&headers, &query, &verifier(), false);

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "bob");
    }

    #[test]
    fn test_query_token_is_accepted() {
        // テスト項目: ヘッダーがなければクエリのトークンで認証される
        // given (前提条件):
        let query = ConnectQuery {
            user_id: None,
            token: Some(token("carol")),
        };

        // when (操作):
        let identity = resolve_identity(&HeaderMap::new(), &query, &verifier(), false);

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "carol");
        assert_eq!(identity.source, IdentitySource::Query);
    }

    #[test]
    fn test_invalid_token_falls_back_to_anonymous() {
        // テスト項目: 検証に失敗したトークンは匿名ユーザーとして扱われる
        // given (前提条件):
        let forged = TokenVerifier::new("other")
            .issue("mallory", Duration::hours(1))
            .unwrap();
        let headers = headers_with(&forged);

        // when (操作):
        let identity = resolve_identity(&headers, &ConnectQuery::default(), &verifier(), false);

        // then (期待する結果):
        assert!(identity.user_id.is_anonymous());
        assert_eq!(identity.source, IdentitySource::Anonymous);
    }

    #[test]
    fn test_no_credential_is_anonymous() {
        // テスト項目: 資格情報がなければ匿名ユーザーになる
        // when (操作):
        let identity = resolve_identity(
            &HeaderMap::new(),
            &ConnectQuery::default(),
            &verifier(),
            true,
        );

        // then (期待する結果):
        assert!(identity.user_id.is_anonymous());
    }

    #[test]
    fn test_token_prefix_is_truncated() {
        // テスト項目: ログ用のトークン接頭辞は 12 文字までに切り詰められる
        // then (期待する結果):
        assert_eq!(token_prefix("abcdefghijklmnopqrstuvwxyz"), "abcdefghijkl");
        assert_eq!(token_prefix("short"), "short");
    }
}
