//! Bearer token verification
//!
//! Tokens are compact JWS values signed with HMAC-SHA256 (`alg = HS256`).
//! Claims are deserialized once into a typed structure; a token missing a
//! required claim is rejected outright.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Token verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported signing algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid signing key")]
    InvalidKey,
}

/// Typed token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user ID
    pub sub: String,
    /// Expiry (Unix seconds)
    pub exp: i64,
    /// Issued at (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// HS256 token verifier (and issuer, for tests and tooling)
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)
    }

    /// Verify `token` against the current time
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments".to_string()));
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::Malformed(format!("signature: {e}")))?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = decode_segment(payload_b64)?;
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Malformed("empty sub claim".to_string()));
        }
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Sign a token for `sub` valid for `ttl` from `now`
    pub fn issue_at(&self, sub: &str, ttl: Duration, now: DateTime<Utc>) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".to_string(),
            typ: Some("JWT".to_string()),
        };
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
        };

        let header_b64 = encode_segment(&header)?;
        let payload_b64 = encode_segment(&claims)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{header_b64}.{payload_b64}.{signature}"))
    }

    /// Sign a token for `sub` valid for `ttl` from now
    pub fn issue(&self, sub: &str, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(sub, ttl, Utc::now())
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("json: {e}")))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        // テスト項目: 発行したトークンが検証でき、sub が取り出せる
        // given (前提条件):
        let verifier = TokenVerifier::new("secret");
        let token = verifier.issue_at("alice", Duration::hours(1), now()).unwrap();

        // when (操作):
        let claims = verifier.verify_at(&token, now()).unwrap();

        // then (期待する結果):
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, now().timestamp() + 3600);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        // テスト項目: 異なる鍵で署名されたトークンは拒否される
        // given (前提条件):
        let token = TokenVerifier::new("other")
            .issue_at("alice", Duration::hours(1), now())
            .unwrap();

        // when (操作):
        let result = TokenVerifier::new("secret").verify_at(&token, now());

        // then (期待する結果):
        assert_eq!(result, Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // テスト項目: 期限切れのトークンは拒否される
        // given (前提条件):
        let verifier = TokenVerifier::new("secret");
        let token = verifier.issue_at("alice", Duration::minutes(5), now()).unwrap();

        // when (操作):
        let result = verifier.verify_at(&token, now() + Duration::minutes(6));

        // then (期待する結果):
        assert_eq!(result, Err(TokenError::Expired));
    }

    #[test]
    fn test_missing_sub_claim_is_rejected() {
        // テスト項目: sub クレームのないトークンは拒否される
        // given (前提条件):
        let verifier = TokenVerifier::new("secret");
        let header = encode_segment(&serde_json::json!({"alg": "HS256"})).unwrap();
        let payload =
            encode_segment(&serde_json::json!({"user_id": "alice", "exp": now().timestamp() + 60}))
                .unwrap();
        let mut mac = verifier.mac().unwrap();
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        let token = format!("{header}.{payload}.{signature}");

        // when (操作):
        let result = verifier.verify_at(&token, now());

        // then (期待する結果):
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_non_hs256_algorithm_is_rejected() {
        // テスト項目: HS256 以外のアルゴリズムは拒否される
        // given (前提条件):
        let header = encode_segment(&serde_json::json!({"alg": "none"})).unwrap();
        let payload = encode_segment(&serde_json::json!({"sub": "alice", "exp": 1})).unwrap();
        let token = format!("{header}.{payload}.");

        // when (操作):
        let result = TokenVerifier::new("secret").verify_at(&token, now());

        // then (期待する結果):
        assert_eq!(
            result,
            Err(TokenError::UnsupportedAlgorithm("none".to_string()))
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        // テスト項目: 形式が不正なトークンは拒否される
        // when (操作):
        let result = TokenVerifier::new("secret").verify_at("not-a-token", now());

        // then (期待する結果):
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }
}
