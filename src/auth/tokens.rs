//! Signed access and refresh tokens (HS256).

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub jti: String,
    pub token_type: TokenType,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or has a bad signature")]
    Invalid,
    #[error("wrong token type, expected {expected}")]
    WrongType { expected: TokenType },
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Access/refresh pair returned by login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue(&self, user_id: i64, token_type: TokenType) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            user_id,
            jti: Uuid::new_v4().simple().to_string(),
            token_type,
            exp: now + ttl,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access)?,
            refresh: self.issue(user_id, TokenType::Refresh)?,
        })
    }

    /// Verify signature and expiry, and that the token is of the expected type.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret", 300, 86_400)
    }

    #[test]
    fn issued_pair_decodes_with_matching_types() {
        let tokens = service();
        let pair = tokens.issue_pair(42).unwrap();

        let access = tokens.decode(&pair.access, TokenType::Access).unwrap();
        assert_eq!(access.user_id, 42);
        assert_eq!(access.exp - access.iat, 300);

        let refresh = tokens.decode(&pair.refresh, TokenType::Refresh).unwrap();
        assert_eq!(refresh.user_id, 42);
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn token_type_is_enforced() {
        let tokens = service();
        let refresh = tokens.issue(1, TokenType::Refresh).unwrap();
        assert!(matches!(
            tokens.decode(&refresh, TokenType::Access),
            Err(TokenError::WrongType { .. })
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = TokenService::new("unit-test-secret", -10, -10);
        let access = tokens.issue(1, TokenType::Access).unwrap();
        assert!(matches!(
            tokens.decode(&access, TokenType::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn foreign_signatures_are_rejected() {
        let other = TokenService::new("someone-else", 300, 300);
        let token = other.issue(1, TokenType::Access).unwrap();
        assert!(matches!(
            service().decode(&token, TokenType::Access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            service().decode("garbage", TokenType::Access),
            Err(TokenError::Invalid)
        ));
    }
}
