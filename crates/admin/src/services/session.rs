//! Signed session tokens.
//!
//! One generic HS256 issuer serves two independent trust domains: the admin
//! session cookie and the store-edit session cookie. Each domain gets its
//! own `SessionIssuer` instance with its own secret and claim shape; they
//! share nothing but this abstraction.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use machiya_core::{EditCredentialId, EditTokenId, Email};

use crate::models::CurrentAdmin;

/// Session lifetime for both admin and store-edit sessions.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Errors from signing or verifying a session token.
#[derive(Debug, Error)]
pub enum SessionTokenError {
    /// The token's signature or structure is invalid.
    #[error("invalid session token")]
    Invalid,
    /// The token was valid once but its expiry has passed.
    #[error("expired session token")]
    Expired,
    /// Signing failed (should not happen with a valid secret).
    #[error("failed to sign session token: {0}")]
    Signing(String),
}

/// Registered claims wrapper around a domain-specific payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims<T> {
    #[serde(flatten)]
    pub data: T,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Issued-at (unix seconds).
    pub iat: i64,
}

/// Payload of a store-edit session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSessionClaims {
    pub token_id: EditTokenId,
    pub credential_id: EditCredentialId,
    pub email: Email,
}

/// Payload of an admin session token.
pub type AdminSessionClaims = CurrentAdmin;

/// Parameterized signer/verifier for one trust domain.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    /// Create an issuer from a shared secret and a TTL in hours.
    #[must_use]
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Sign a session token. Returns the token string and its expiry.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError::Signing` if encoding fails.
    pub fn issue<T: Serialize>(
        &self,
        data: T,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), SessionTokenError> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            data,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SessionTokenError::Signing(e.to_string()))?;
        Ok((token, expires_at))
    }

    /// Verify a session token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError::Expired` for a well-signed but stale
    /// token, `SessionTokenError::Invalid` for everything else.
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<SessionClaims<T>, SessionTokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<SessionClaims<T>>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionTokenError::Expired,
                _ => SessionTokenError::Invalid,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(b"test-secret-at-least-32-bytes-long", SESSION_TTL_HOURS)
    }

    fn claims() -> EditSessionClaims {
        EditSessionClaims {
            token_id: EditTokenId::new(7),
            credential_id: EditCredentialId::new(3),
            email: Email::parse("owner@example.com").unwrap(),
        }
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let now = Utc::now();
        let (token, expires_at) = issuer().issue(claims(), now).unwrap();
        assert_eq!(expires_at, now + Duration::hours(24));

        let verified: SessionClaims<EditSessionClaims> = issuer().verify(&token).unwrap();
        assert_eq!(verified.data.token_id, EditTokenId::new(7));
        assert_eq!(verified.data.credential_id, EditCredentialId::new(3));
        assert_eq!(verified.exp, expires_at.timestamp());
    }

    #[test]
    fn test_expired_token_is_rejected_as_expired() {
        let issued_at = Utc::now() - Duration::hours(25);
        let (token, _) = issuer().issue(claims(), issued_at).unwrap();

        let err = issuer().verify::<EditSessionClaims>(&token).unwrap_err();
        assert!(matches!(err, SessionTokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_invalid_not_expired() {
        let (token, _) = issuer().issue(claims(), Utc::now()).unwrap();
        let other = SessionIssuer::new(b"a-completely-different-signing-key", SESSION_TTL_HOURS);

        let err = other.verify::<EditSessionClaims>(&token).unwrap_err();
        assert!(matches!(err, SessionTokenError::Invalid));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let err = issuer()
            .verify::<EditSessionClaims>("not-a-token")
            .unwrap_err();
        assert!(matches!(err, SessionTokenError::Invalid));
    }

    #[test]
    fn test_domains_do_not_cross_verify() {
        // An admin token must not pass edit-session verification even with
        // the same secret, because the claim shapes differ.
        let admin = CurrentAdmin {
            id: machiya_core::AdminUserId::new(1),
            login_id: Email::parse("staff@example.com").unwrap(),
            display_name: "Staff".to_owned(),
            role: machiya_core::AdminRole::Admin,
            assigned_store_id: None,
        };
        let (token, _) = issuer().issue(admin, Utc::now()).unwrap();

        let err = issuer().verify::<EditSessionClaims>(&token).unwrap_err();
        assert!(matches!(err, SessionTokenError::Invalid));
    }
}
