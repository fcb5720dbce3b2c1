//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs whose `sub` claim is the caller's account
//! identity. Proving control of that account (wallet signature, SSO) is
//! the issuer's job; this server only checks the signature and expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use roach_race::Identity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Account identity
    pub exp: i64,    // Expiration timestamp
    pub iat: i64,    // Issued at timestamp
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.sub)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token subject is empty")]
    EmptySubject,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Signs and verifies bearer tokens with a shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl TokenVerifier {
    pub fn new(secret: &str, token_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
        }
    }

    /// Issue a token for `identity`
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        if identity.is_empty() {
            return Err(AuthError::EmptySubject);
        }

        let now = Utc::now();
        let claims = Claims {
            sub: identity.to_string(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AuthError::EmptySubject);
        }

        Ok(token_data.claims)
    }
}
