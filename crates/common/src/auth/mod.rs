//! Authentication utilities
//!
//! Provides:
//! - JWT access token generation and validation
//! - Signed consent-link tokens (emailed to participants)
//! - Argon2 password hashing for the legacy login path
//!
//! The API layer extracts an authenticated principal with these
//! primitives; the core never sees raw credentials beyond the password
//! comparison at login.

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Purpose tag distinguishing consent-link tokens from access tokens
const CONSENT_PURPOSE: &str = "consent";

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,

    /// The user's email
    pub email: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| AppError::invalid_token())
    }
}

/// Claims carried by a consent-link token
#[derive(Debug, Serialize, Deserialize)]
pub struct ConsentClaims {
    /// Subject (user ID of the participant)
    pub sub: String,

    /// Session the consent decision applies to
    pub session_id: String,

    /// Always "consent"; rejects access tokens pasted into consent URLs
    pub purpose: String,

    pub exp: i64,

    pub iat: i64,
}

impl ConsentClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| AppError::invalid_token())
    }
}

/// JWT token manager for access and consent tokens
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    consent_ttl_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager from configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl_secs: config.jwt_expiration_secs as i64,
            consent_ttl_secs: config.consent_expiration_secs as i64,
        }
    }

    /// Generate an access token for a user
    pub fn issue_access(&self, user_id: i64, email: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_ttl_secs);

        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::expired_token(),
                _ => AppError::invalid_token(),
            })
    }

    /// Generate a consent-link token for one participant of one session.
    /// The link stays valid long enough for participants to review, then
    /// expires.
    pub fn issue_consent(&self, user_id: i64, session_id: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.consent_ttl_secs);

        let claims = ConsentClaims {
            sub: user_id.to_string(),
            session_id: session_id.to_string(),
            purpose: CONSENT_PURPOSE.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate consent token: {}", e),
        })
    }

    /// Validate and decode a consent-link token
    pub fn verify_consent(&self, token: &str) -> Result<ConsentClaims> {
        let claims = decode::<ConsentClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::expired_token(),
                _ => AppError::invalid_token(),
            })?;

        if claims.purpose != CONSENT_PURPOSE {
            return Err(AppError::invalid_token());
        }

        Ok(claims)
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn manager() -> JwtManager {
        JwtManager::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_secs: 3600,
            consent_expiration_secs: 7 * 24 * 3600,
        })
    }

    #[test]
    fn test_access_round_trip() {
        let manager = manager();
        let token = manager.issue_access(42, "ada@example.com").unwrap();
        let claims = manager.verify_access(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.email, "ada@example.com");
    }

    #[test]
    fn test_consent_round_trip() {
        let manager = manager();
        let token = manager.issue_consent(7, "ab12cd34").unwrap();
        let claims = manager.verify_consent(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.session_id, "ab12cd34");
    }

    #[test]
    fn test_consent_rejects_access_tokens() {
        let manager = manager();
        let token = manager.issue_access(42, "ada@example.com").unwrap();
        assert!(manager.verify_consent(&token).is_err());
    }

    #[test]
    fn test_access_rejects_garbage() {
        let manager = manager();
        assert!(manager.verify_access("not-a-token").is_err());
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("abc"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }
}
