//! Single-use unlock token repository.
//!
//! Unlock tokens are mailed to the account holder when a lockout trips. The
//! raw value is never stored; the service hands us an opaque hash.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;

/// Which kind of account an unlock token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockAccountKind {
    Admin,
    EditCredential,
}

impl UnlockAccountKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::EditCredential => "edit_credential",
        }
    }

    fn parse(s: &str) -> Result<Self, RepositoryError> {
        match s {
            "admin" => Ok(Self::Admin),
            "edit_credential" => Ok(Self::EditCredential),
            other => Err(RepositoryError::DataCorruption(format!(
                "invalid unlock account kind: {other}"
            ))),
        }
    }
}

/// Repository for single-use unlock tokens.
pub struct UnlockTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UnlockTokenRepository<'a> {
    /// Create a new unlock token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new unlock token hash for an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        kind: UnlockAccountKind,
        account_id: i32,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO unlock_tokens (account_kind, account_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(kind.as_str())
        .bind(account_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Consume an unlock token: marks it used and returns the account it
    /// unlocks. Returns `None` if the token is unknown, expired, or already
    /// used - single-use is enforced by the conditional update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(
        &self,
        token_hash: &str,
    ) -> Result<Option<(UnlockAccountKind, i32)>, RepositoryError> {
        let row = sqlx::query_as::<_, (String, i32)>(
            "UPDATE unlock_tokens SET used_at = now() \
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > now() \
             RETURNING account_kind, account_id",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(kind, account_id)| Ok((UnlockAccountKind::parse(&kind)?, account_id)))
            .transpose()
    }
}
