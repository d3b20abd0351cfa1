//! Password hashing and random secret generation.
//!
//! Hashing uses bcrypt; generated owner passwords come from a fixed
//! alphabet with visually similar characters removed (no 0/O, 1/l/I).

use rand::Rng;
use rand::seq::IndexedRandom;
use thiserror::Error;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Alphabet for generated store-owner passwords. Excludes visually
/// ambiguous characters; preserved exactly for operator-facing output.
pub const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

/// Length of generated store-owner passwords.
pub const GENERATED_PASSWORD_LENGTH: usize = 8;

/// Errors from hashing or verification.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Hash a password with bcrypt (cost 10).
///
/// # Errors
///
/// Returns `PasswordError::Bcrypt` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// Verify a password against a bcrypt hash.
///
/// # Errors
///
/// Returns `PasswordError::Bcrypt` if the hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(password, hash)?)
}

/// Generate an 8-character password from the unambiguous alphabet.
#[must_use]
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| {
            PASSWORD_ALPHABET
                .choose(&mut rng)
                .copied()
                .unwrap_or(b'3') as char
        })
        .collect()
}

/// Generate an unguessable opaque token value (64 hex characters).
///
/// Used for edit tokens and unlock tokens.
#[must_use]
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 digest of a token value, for at-rest storage of unlock
/// tokens (the raw value only ever travels in the email link).
#[must_use]
pub fn digest_token_value(token: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("s3cret-pw").unwrap();
        assert!(verify_password("s3cret-pw", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_alphabet_has_no_ambiguous_characters() {
        for forbidden in [b'0', b'O', b'1', b'l', b'I'] {
            assert!(
                !PASSWORD_ALPHABET.contains(&forbidden),
                "alphabet must exclude {}",
                forbidden as char
            );
        }
    }

    #[test]
    fn test_generated_password_shape() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(
            password
                .bytes()
                .all(|b| PASSWORD_ALPHABET.contains(&b))
        );
    }

    #[test]
    fn test_token_value_shape() {
        let token = generate_token_value();
        assert_eq!(token.len(), 64);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(token, generate_token_value());
    }

    #[test]
    fn test_digest_is_deterministic_and_distinct() {
        let token = generate_token_value();
        assert_eq!(digest_token_value(&token), digest_token_value(&token));
        assert_ne!(digest_token_value(&token), token);
        assert_eq!(digest_token_value(&token).len(), 64);
    }
}
