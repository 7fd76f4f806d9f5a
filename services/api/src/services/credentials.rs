//! services/api/src/services/credentials.rs
//!
//! Password hashing, bearer tokens, one-time passcodes and password-reset tokens.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use client_portal_core::domain::User;
use client_portal_core::ports::PortError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::error;
use uuid::Uuid;

//=========================================================================================
// Passwords
//=========================================================================================

pub fn hash_password(password: &str) -> Result<String, PortError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("failed to hash password".to_string())
        })
}

/// False for a wrong password. A stored hash that cannot be parsed is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PortError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("stored password hash is malformed".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

//=========================================================================================
// Bearer Tokens
//=========================================================================================

/// Claims carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub pan: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and checks HS256 session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, PortError> {
        let claims = Claims {
            sub: user.id,
            pan: user.pan.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| PortError::Unexpected(format!("JWT encode: {e}")))
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, PortError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| PortError::Unauthorized)
    }
}

//=========================================================================================
// One-Time Secrets
//=========================================================================================

/// A uniformly random six-digit code.
pub fn generate_otp() -> String {
    rand::rng().random_range(100_000..1_000_000).to_string()
}

/// 20 random bytes, hex-encoded. Only its hash is stored.
pub fn generate_reset_token() -> String {
    let bytes: [u8; 20] = rand::rng().random();
    hex::encode(bytes)
}

/// SHA-256 of the presented token, hex-encoded.
pub fn hash_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
