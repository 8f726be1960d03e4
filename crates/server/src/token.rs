use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{domain::UserId, error::ApiError, protocol::TokenPair};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: u64,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }
}

pub fn mint_token(
    cfg: &TokenConfig,
    user_id: UserId,
    kind: TokenKind,
) -> Result<String, jsonwebtoken::errors::Error> {
    let ttl = match kind {
        TokenKind::Access => cfg.access_ttl_seconds,
        TokenKind::Refresh => cfg.refresh_ttl_seconds,
    };
    let now = Utc::now();
    let claims = Claims {
        sub: format!("user:{}", user_id.0),
        user_id: user_id.0,
        token_type: kind,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl)).timestamp(),
        jti: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

pub fn mint_pair(
    cfg: &TokenConfig,
    user_id: UserId,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access: mint_token(cfg, user_id, TokenKind::Access)?,
        refresh: mint_token(cfg, user_id, TokenKind::Refresh)?,
    })
}

/// Validates signature, expiry (no leeway) and token kind.
pub fn verify_token(cfg: &TokenConfig, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .map_err(|err| ApiError::unauthorized(format!("token not valid: {err}")))?;

    if data.claims.token_type != expected {
        return Err(ApiError::unauthorized("token has wrong type"));
    }
    Ok(data.claims)
}

#[cfg(test)]
#[path = "tests/token_tests.rs"]
mod tests;
