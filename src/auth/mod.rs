use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::database::models::{Role, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub role: Role,
    pub telegram_username: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret is not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Signs and verifies bearer tokens with a shared HS256 secret
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl TokenAuthenticator {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            // Capped at ten years
            expiry: Duration::hours(expiry_hours.min(24 * 365 * 10) as i64),
        })
    }

    /// Mint a token for `user` with the configured lifetime
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_with_ttl(user.id, user.role, &user.telegram_username, self.expiry)
    }

    pub fn issue_with_ttl(
        &self,
        id: i64,
        role: Role,
        telegram_username: &str,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            id,
            role,
            telegram_username: telegram_username.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Claims for a bearer token, or `None` when it is missing, malformed,
    /// expired or signed with another key
    pub fn authenticate(&self, token: Option<&str>) -> Option<Claims> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;
        match self.verify(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                None
            }
        }
    }
}
