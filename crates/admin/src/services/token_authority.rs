//! Edit token and session authority.
//!
//! An edit token is a persistent capability for one store's self-service
//! edit page. A credential gate may be layered on top; passing it mints a
//! 24-hour session. Authentication requires the signed cookie AND the
//! server-side session row to agree - either side alone proves nothing.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use machiya_core::{EditRequestId, EditTokenId, Email};

use crate::db::{
    AuditLogRepository, EditAccessRepository, EditRequestRepository, RepositoryError,
    unlock_tokens::UnlockAccountKind,
};
use crate::models::{EditCredential, EditSession, EditToken};
use crate::services::admin_auth::issue_unlock_token;
use crate::services::email::EmailService;
use crate::services::lockout::{self, FailureOutcome, LockoutPolicy, LockoutState};
use crate::services::password::{
    PasswordError, generate_token_value, hash_password, verify_password,
};
use crate::services::session::{EditSessionClaims, SessionIssuer, SessionTokenError};

/// Errors from token and session operations.
#[derive(Debug, Error)]
pub enum TokenAuthorityError {
    /// No token with that value or ID exists.
    #[error("edit token not found")]
    TokenNotFound,

    /// The token exists but has been revoked.
    #[error("edit token revoked")]
    TokenRevoked,

    /// Tokens are only issued against approved requests with a linked store.
    #[error("request is not approved")]
    RequestNotApproved,

    /// No credential gate is configured for this token.
    #[error("no credential configured")]
    NoCredential,

    /// Wrong email or password for the credential gate.
    #[error("invalid credentials")]
    InvalidCredentials { attempts_remaining: Option<i32> },

    /// The credential gate is locked; retry after the given minutes.
    #[error("credential locked for {remaining_minutes} more minutes")]
    LockedOut { remaining_minutes: i64 },

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Session(#[from] SessionTokenError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Why an authentication check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthDenialReason {
    /// The gate is on and no session cookie was presented.
    NoSession,
    /// The cookie failed signature verification.
    InvalidSignature,
    /// The cookie was signed for a different token.
    TokenMismatch,
    /// The server-side session row is missing or revoked.
    SessionInactive,
    /// The session's 24 hours are up.
    SessionExpired,
}

/// Result of an authentication check against a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAuthOutcome {
    /// No credential gate applies; the token alone grants access.
    Open,
    /// The gate is on and the presented session passes.
    Authenticated {
        session_id: machiya_core::EditSessionId,
        expires_at: DateTime<Utc>,
    },
    /// The gate is on and the presented session fails.
    Denied { reason: AuthDenialReason },
}

/// A successful credential login.
#[derive(Debug)]
pub struct EditLogin {
    pub session: EditSession,
    pub session_token: String,
}

/// Audit entry for an attempt rejected by the lockout check, before the
/// password hash is consulted.
fn blocked_audit_entry(
    token_id: EditTokenId,
    remaining_minutes: i64,
) -> (&'static str, serde_json::Value) {
    (
        "edit_credential.login_blocked",
        serde_json::json!({
            "token_id": token_id,
            "remaining_minutes": remaining_minutes,
        }),
    )
}

/// Audit entry for a failed credential verification: `failed` with the
/// countdown below the threshold, `locked_out` at it.
fn failure_audit_entry(
    token_id: EditTokenId,
    outcome: FailureOutcome,
) -> (&'static str, serde_json::Value) {
    match outcome {
        FailureOutcome::Failed { attempts_remaining } => (
            "edit_credential.login_failed",
            serde_json::json!({
                "token_id": token_id,
                "attempts_remaining": attempts_remaining,
            }),
        ),
        FailureOutcome::LockedOut { .. } => (
            "edit_credential.locked_out",
            serde_json::json!({ "token_id": token_id }),
        ),
    }
}

/// Token issuance, credential management, and session authentication.
pub struct TokenAuthority<'a> {
    pool: &'a PgPool,
    email: &'a EmailService,
    sessions: &'a SessionIssuer,
}

impl<'a> TokenAuthority<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, sessions: &'a SessionIssuer) -> Self {
        Self {
            pool,
            email,
            sessions,
        }
    }

    /// Issue a new edit token for an approved request.
    ///
    /// # Errors
    ///
    /// Returns `TokenAuthorityError::RequestNotApproved` unless the request
    /// is approved and linked to a store.
    pub async fn issue_token(
        &self,
        request_id: EditRequestId,
    ) -> Result<EditToken, TokenAuthorityError> {
        let request = EditRequestRepository::new(self.pool)
            .get_by_id(request_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if request.status != machiya_core::RequestStatus::Approved {
            return Err(TokenAuthorityError::RequestNotApproved);
        }
        let Some(store_id) = request.store_id else {
            return Err(TokenAuthorityError::RequestNotApproved);
        };

        let token = EditAccessRepository::new(self.pool)
            .create_token(request_id, store_id, &generate_token_value())
            .await?;

        AuditLogRepository::new(self.pool)
            .record(
                "edit_token.issued",
                serde_json::json!({ "token_id": token.id, "request_id": request_id }),
                None,
                None,
            )
            .await;

        Ok(token)
    }

    /// Create or replace the credential gate for a token. Replacing resets
    /// any lockout.
    ///
    /// # Errors
    ///
    /// Returns `TokenAuthorityError::TokenNotFound` for an unknown token.
    pub async fn set_credential(
        &self,
        token_id: EditTokenId,
        email: &Email,
        password: &str,
        require_auth: bool,
    ) -> Result<EditCredential, TokenAuthorityError> {
        let access = EditAccessRepository::new(self.pool);
        access
            .get_token_by_id(token_id)
            .await?
            .ok_or(TokenAuthorityError::TokenNotFound)?;

        let credential = access
            .upsert_credential(token_id, email, &hash_password(password)?, require_auth)
            .await?;

        AuditLogRepository::new(self.pool)
            .record(
                "edit_credential.set",
                serde_json::json!({ "token_id": token_id, "require_auth": require_auth }),
                None,
                None,
            )
            .await;

        Ok(credential)
    }

    /// Revoke a token. Sessions behind it become unusable immediately since
    /// every check re-verifies the token row first.
    ///
    /// # Errors
    ///
    /// Returns `TokenAuthorityError::TokenNotFound` for an unknown token.
    pub async fn deactivate_token(&self, token_id: EditTokenId) -> Result<(), TokenAuthorityError> {
        match EditAccessRepository::new(self.pool)
            .deactivate_token(token_id)
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(TokenAuthorityError::TokenNotFound),
            Err(e) => return Err(e.into()),
        }

        AuditLogRepository::new(self.pool)
            .record(
                "edit_token.deactivated",
                serde_json::json!({ "token_id": token_id }),
                None,
                None,
            )
            .await;

        Ok(())
    }

    /// Resolve a token value to an active token, stamping its last-used
    /// time.
    ///
    /// # Errors
    ///
    /// Returns `TokenAuthorityError::TokenNotFound` or
    /// `TokenAuthorityError::TokenRevoked`.
    pub async fn resolve_token(&self, token_value: &str) -> Result<EditToken, TokenAuthorityError> {
        let access = EditAccessRepository::new(self.pool);
        let token = access
            .get_token_by_value(token_value)
            .await?
            .ok_or(TokenAuthorityError::TokenNotFound)?;

        if !token.is_active {
            return Err(TokenAuthorityError::TokenRevoked);
        }

        access.touch_token(token.id).await?;
        Ok(token)
    }

    /// Check whether a request bearing this token (and possibly a session
    /// cookie) is authorized to edit.
    ///
    /// Expired session rows are flipped inactive as a side effect, so a
    /// stale cookie cannot be replayed against a clock rollback.
    ///
    /// # Errors
    ///
    /// Returns token-level errors only; gate outcomes are in the result.
    pub async fn check_auth(
        &self,
        token_value: &str,
        session_cookie: Option<&str>,
    ) -> Result<(EditToken, CheckAuthOutcome), TokenAuthorityError> {
        let token = self.resolve_token(token_value).await?;
        let access = EditAccessRepository::new(self.pool);

        let gate_is_on = access
            .get_credential_for_token(token.id)
            .await?
            .is_some_and(|credential| credential.require_auth && credential.is_active);
        if !gate_is_on {
            return Ok((token, CheckAuthOutcome::Open));
        }

        let Some(cookie) = session_cookie else {
            return Ok((token, CheckAuthOutcome::Denied {
                reason: AuthDenialReason::NoSession,
            }));
        };

        let claims = match self.sessions.verify::<EditSessionClaims>(cookie) {
            Ok(claims) => claims,
            Err(SessionTokenError::Expired) => {
                // Retire the server-side row so the expiry is permanent.
                if let Some(row) = access.get_session_by_token_value(cookie).await? {
                    access.deactivate_session(row.id).await?;
                }
                return Ok((token, CheckAuthOutcome::Denied {
                    reason: AuthDenialReason::SessionExpired,
                }));
            }
            Err(_) => {
                return Ok((token, CheckAuthOutcome::Denied {
                    reason: AuthDenialReason::InvalidSignature,
                }));
            }
        };

        if claims.data.token_id != token.id {
            return Ok((token, CheckAuthOutcome::Denied {
                reason: AuthDenialReason::TokenMismatch,
            }));
        }

        let Some(row) = access.get_session_by_token_value(cookie).await? else {
            return Ok((token, CheckAuthOutcome::Denied {
                reason: AuthDenialReason::SessionInactive,
            }));
        };

        if !row.is_active {
            return Ok((token, CheckAuthOutcome::Denied {
                reason: AuthDenialReason::SessionInactive,
            }));
        }

        if row.expires_at <= Utc::now() {
            access.deactivate_session(row.id).await?;
            return Ok((token, CheckAuthOutcome::Denied {
                reason: AuthDenialReason::SessionExpired,
            }));
        }

        Ok((token, CheckAuthOutcome::Authenticated {
            session_id: row.id,
            expires_at: row.expires_at,
        }))
    }

    /// Pass the credential gate: verify email and password, then mint a
    /// session (signed cookie plus server row).
    ///
    /// # Errors
    ///
    /// Returns `TokenAuthorityError::LockedOut` while the gate is locked
    /// and `TokenAuthorityError::InvalidCredentials` for a wrong email or
    /// password.
    pub async fn login(
        &self,
        token_value: &str,
        email: &Email,
        password: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<EditLogin, TokenAuthorityError> {
        let token = self.resolve_token(token_value).await?;
        let access = EditAccessRepository::new(self.pool);
        let audit = AuditLogRepository::new(self.pool);
        let now = Utc::now();

        let credential = access
            .get_credential_for_token(token.id)
            .await?
            .filter(|credential| credential.is_active)
            .ok_or(TokenAuthorityError::NoCredential)?;

        let state = LockoutState {
            failed_attempts: credential.failed_attempts,
            locked_until: credential.locked_until,
        };
        if let Err(remaining_minutes) = lockout::check(state, now) {
            let (action, details) = blocked_audit_entry(token.id, remaining_minutes);
            audit.record(action, details, ip_address, user_agent).await;
            return Err(TokenAuthorityError::LockedOut { remaining_minutes });
        }

        let verified =
            credential.email == *email && verify_password(password, &credential.password_hash)?;

        if verified {
            access.record_credential_login_success(credential.id).await?;

            let claims = EditSessionClaims {
                token_id: token.id,
                credential_id: credential.id,
                email: credential.email.clone(),
            };
            let (session_token, expires_at) = self.sessions.issue(claims, now)?;
            let session = access
                .create_session(
                    token.id,
                    credential.id,
                    &session_token,
                    ip_address,
                    user_agent,
                    expires_at,
                )
                .await?;

            audit
                .record(
                    "edit_session.login",
                    serde_json::json!({ "token_id": token.id, "session_id": session.id }),
                    ip_address,
                    user_agent,
                )
                .await;

            return Ok(EditLogin {
                session,
                session_token,
            });
        }

        let (next, outcome) = lockout::on_failure(LockoutPolicy::EDIT_CREDENTIAL, state, now);
        access
            .set_credential_lockout_state(credential.id, next.failed_attempts, next.locked_until)
            .await?;

        let (action, details) = failure_audit_entry(token.id, outcome);
        audit.record(action, details, ip_address, user_agent).await;

        match outcome {
            FailureOutcome::Failed { attempts_remaining } => {
                Err(TokenAuthorityError::InvalidCredentials {
                    attempts_remaining: Some(attempts_remaining),
                })
            }
            FailureOutcome::LockedOut { locked_until } => {
                issue_unlock_token(
                    self.pool,
                    self.email,
                    UnlockAccountKind::EditCredential,
                    credential.id.as_i32(),
                    &credential.email,
                    LockoutPolicy::EDIT_CREDENTIAL.lockout_minutes,
                )
                .await?;

                Err(TokenAuthorityError::LockedOut {
                    remaining_minutes: lockout::remaining_minutes(locked_until, now),
                })
            }
        }
    }

    /// End a session. Idempotent: an unknown cookie is a no-op.
    ///
    /// # Errors
    ///
    /// Returns token-level errors and database failures.
    pub async fn logout(
        &self,
        token_value: &str,
        session_cookie: &str,
    ) -> Result<(), TokenAuthorityError> {
        let token = self.resolve_token(token_value).await?;
        let access = EditAccessRepository::new(self.pool);

        if let Some(row) = access.get_session_by_token_value(session_cookie).await?
            && row.token_id == token.id
        {
            access.deactivate_session(row.id).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_attempt_is_audited_with_countdown() {
        let (action, details) = blocked_audit_entry(EditTokenId::new(4), 9);
        assert_eq!(action, "edit_credential.login_blocked");
        assert_eq!(details["token_id"], 4);
        assert_eq!(details["remaining_minutes"], 9);
    }

    #[test]
    fn test_failed_attempt_is_audited_with_attempts_remaining() {
        let (action, details) = failure_audit_entry(
            EditTokenId::new(4),
            FailureOutcome::Failed {
                attempts_remaining: 2,
            },
        );
        assert_eq!(action, "edit_credential.login_failed");
        assert_eq!(details["token_id"], 4);
        assert_eq!(details["attempts_remaining"], 2);
    }

    #[test]
    fn test_lockout_trip_keeps_its_own_action() {
        let (action, details) = failure_audit_entry(
            EditTokenId::new(4),
            FailureOutcome::LockedOut {
                locked_until: Utc::now(),
            },
        );
        assert_eq!(action, "edit_credential.locked_out");
        assert_eq!(details["token_id"], 4);
    }
}
