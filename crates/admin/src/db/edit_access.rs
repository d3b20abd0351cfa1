//! Edit token, credential, and session repository.
//!
//! These three tables form the self-service trust chain; they are accessed
//! together often enough that one repository covers all of them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use machiya_core::{EditCredentialId, EditRequestId, EditSessionId, EditTokenId, Email, StoreId};

use super::RepositoryError;
use crate::models::{EditCredential, EditSession, EditToken};

/// Internal row type for edit token queries.
#[derive(Debug, sqlx::FromRow)]
struct EditTokenRow {
    id: i32,
    request_id: i32,
    store_id: i32,
    token: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<EditTokenRow> for EditToken {
    fn from(row: EditTokenRow) -> Self {
        Self {
            id: EditTokenId::new(row.id),
            request_id: EditRequestId::new(row.request_id),
            store_id: StoreId::new(row.store_id),
            token: row.token,
            is_active: row.is_active,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

/// Internal row type for edit credential queries.
#[derive(Debug, sqlx::FromRow)]
struct EditCredentialRow {
    id: i32,
    token_id: i32,
    email: String,
    password_hash: String,
    require_auth: bool,
    is_active: bool,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EditCredentialRow> for EditCredential {
    type Error = RepositoryError;

    fn try_from(row: EditCredentialRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid credential email in database: {e}"))
        })?;

        Ok(Self {
            id: EditCredentialId::new(row.id),
            token_id: EditTokenId::new(row.token_id),
            email,
            password_hash: row.password_hash,
            require_auth: row.require_auth,
            is_active: row.is_active,
            failed_attempts: row.failed_attempts,
            locked_until: row.locked_until,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for edit session queries.
#[derive(Debug, sqlx::FromRow)]
struct EditSessionRow {
    id: i32,
    token_id: i32,
    credential_id: i32,
    session_token: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<EditSessionRow> for EditSession {
    fn from(row: EditSessionRow) -> Self {
        Self {
            id: EditSessionId::new(row.id),
            token_id: EditTokenId::new(row.token_id),
            credential_id: EditCredentialId::new(row.credential_id),
            session_token: row.session_token,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const TOKEN_COLUMNS: &str = "id, request_id, store_id, token, is_active, created_at, last_used_at";
const CREDENTIAL_COLUMNS: &str = "id, token_id, email, password_hash, require_auth, is_active, \
     failed_attempts, locked_until, last_login_at, created_at";
const SESSION_COLUMNS: &str = "id, token_id, credential_id, session_token, ip_address, \
     user_agent, expires_at, is_active, created_at";

/// Repository for edit tokens, credentials, and sessions.
pub struct EditAccessRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EditAccessRepository<'a> {
    /// Create a new edit access repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Create a new edit token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token value already exists.
    pub async fn create_token(
        &self,
        request_id: EditRequestId,
        store_id: StoreId,
        token: &str,
    ) -> Result<EditToken, RepositoryError> {
        let row = sqlx::query_as::<_, EditTokenRow>(&format!(
            "INSERT INTO edit_tokens (request_id, store_id, token) \
             VALUES ($1, $2, $3) \
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(request_id.as_i32())
        .bind(store_id.as_i32())
        .bind(token)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "token already exists"))?;

        Ok(row.into())
    }

    /// Get a token by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_token_by_id(
        &self,
        id: EditTokenId,
    ) -> Result<Option<EditToken>, RepositoryError> {
        let row = sqlx::query_as::<_, EditTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM edit_tokens WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Look up a token by its opaque value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<EditToken>, RepositoryError> {
        let row = sqlx::query_as::<_, EditTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM edit_tokens WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List tokens issued for a request, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_tokens_for_request(
        &self,
        request_id: EditRequestId,
    ) -> Result<Vec<EditToken>, RepositoryError> {
        let rows = sqlx::query_as::<_, EditTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM edit_tokens \
             WHERE request_id = $1 ORDER BY created_at DESC"
        ))
        .bind(request_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Stamp a token's last-used time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch_token(&self, id: EditTokenId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE edit_tokens SET last_used_at = now() WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Deactivate a single token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the token doesn't exist.
    pub async fn deactivate_token(&self, id: EditTokenId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE edit_tokens SET is_active = FALSE WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Deactivate every token of a request. Returns the number revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate_tokens_for_request(
        &self,
        request_id: EditRequestId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE edit_tokens SET is_active = FALSE WHERE request_id = $1")
            .bind(request_id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// Create or replace the credential gate for a token.
    ///
    /// Replacing resets the lockout counters; the gate's identity is the
    /// token, not the credential row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_credential(
        &self,
        token_id: EditTokenId,
        email: &Email,
        password_hash: &str,
        require_auth: bool,
    ) -> Result<EditCredential, RepositoryError> {
        let row = sqlx::query_as::<_, EditCredentialRow>(&format!(
            "INSERT INTO edit_credentials (token_id, email, password_hash, require_auth) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (token_id) DO UPDATE \
             SET email = EXCLUDED.email, password_hash = EXCLUDED.password_hash, \
                 require_auth = EXCLUDED.require_auth, is_active = TRUE, \
                 failed_attempts = 0, locked_until = NULL \
             RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(token_id.as_i32())
        .bind(email.as_str())
        .bind(password_hash)
        .bind(require_auth)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get a credential by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credential_by_id(
        &self,
        id: EditCredentialId,
    ) -> Result<Option<EditCredential>, RepositoryError> {
        let row = sqlx::query_as::<_, EditCredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM edit_credentials WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get the credential attached to a token, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credential_for_token(
        &self,
        token_id: EditTokenId,
    ) -> Result<Option<EditCredential>, RepositoryError> {
        let row = sqlx::query_as::<_, EditCredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM edit_credentials WHERE token_id = $1"
        ))
        .bind(token_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Persist credential lockout state after a failed login attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the credential doesn't exist.
    pub async fn set_credential_lockout_state(
        &self,
        id: EditCredentialId,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE edit_credentials SET failed_attempts = $1, locked_until = $2 WHERE id = $3",
        )
        .bind(failed_attempts)
        .bind(locked_until)
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Reset the failure counter and stamp a successful credential login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the credential doesn't exist.
    pub async fn record_credential_login_success(
        &self,
        id: EditCredentialId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE edit_credentials \
             SET failed_attempts = 0, locked_until = NULL, last_login_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Persist a new edit session row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_session(
        &self,
        token_id: EditTokenId,
        credential_id: EditCredentialId,
        session_token: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<EditSession, RepositoryError> {
        let row = sqlx::query_as::<_, EditSessionRow>(&format!(
            "INSERT INTO edit_sessions \
             (token_id, credential_id, session_token, ip_address, user_agent, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(token_id.as_i32())
        .bind(credential_id.as_i32())
        .bind(session_token)
        .bind(ip_address)
        .bind(user_agent)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Look up a session by its signed token value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_session_by_token_value(
        &self,
        session_token: &str,
    ) -> Result<Option<EditSession>, RepositoryError> {
        let row = sqlx::query_as::<_, EditSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM edit_sessions WHERE session_token = $1"
        ))
        .bind(session_token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Flip a session row inactive (logout, or soft-expiry side effect).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate_session(&self, id: EditSessionId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE edit_sessions SET is_active = FALSE WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Deactivate every session behind every token of a request.
    /// Returns the number revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate_sessions_for_request(
        &self,
        request_id: EditRequestId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE edit_sessions SET is_active = FALSE \
             WHERE token_id IN (SELECT id FROM edit_tokens WHERE request_id = $1)",
        )
        .bind(request_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
