//! Engine API bearer tokens.
//!
//! Tokens are HS256 JWTs carrying only an `iat` claim. Engines reject an
//! `iat` more than 60s away from their clock, so a token is reused for a
//! slightly shorter window and then regenerated.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{EngineError, JwtSecret};

const TOKEN_VALIDITY_DURATION: Duration = Duration::from_secs(55);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: u64,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    created_at: SystemTime,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.created_at
            .elapsed()
            .map(|age| age < TOKEN_VALIDITY_DURATION)
            .unwrap_or(false)
    }
}

/// Issues JWTs for authenticating with the Engine API.
pub struct JwtProvider {
    key: EncodingKey,
    cache: RwLock<Option<CachedToken>>,
}

impl JwtProvider {
    pub fn new(secret: &JwtSecret) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            cache: RwLock::new(None),
        }
    }

    /// A fresh token, from cache when possible.
    pub async fn token(&self) -> Result<String, EngineError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed it while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.token.clone());
            }
        }

        let now = SystemTime::now();
        let iat = now
            .duration_since(UNIX_EPOCH)
            .map_err(|e| EngineError::Jwt(e.to_string()))?
            .as_secs();
        let token = encode(&Header::default(), &Claims { iat }, &self.key)
            .map_err(|e| EngineError::Jwt(e.to_string()))?;

        cache.replace(CachedToken {
            token: token.clone(),
            created_at: now,
        });
        Ok(token)
    }
}
