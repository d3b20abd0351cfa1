//! Admin login, lockout enforcement, and unlock-token redemption.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use thiserror::Error;

use machiya_core::{AdminUserId, Email};

use crate::db::{
    AdminUserRepository, AuditLogRepository, EditAccessRepository, RepositoryError,
    UnlockTokenRepository, unlock_tokens::UnlockAccountKind,
};
use crate::models::CurrentAdmin;
use crate::services::email::EmailService;
use crate::services::lockout::{self, FailureOutcome, LockoutPolicy, LockoutState};
use crate::services::password::{
    PasswordError, digest_token_value, generate_token_value, verify_password,
};
use crate::services::session::{SessionIssuer, SessionTokenError};

/// How long an emailed unlock link stays redeemable.
const UNLOCK_TOKEN_TTL_HOURS: i64 = 24;

/// Errors from admin authentication.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Unknown account, inactive account, or wrong password. The countdown
    /// is present only when a real account absorbed the failure.
    #[error("invalid credentials")]
    InvalidCredentials { attempts_remaining: Option<i32> },

    /// The account is locked; retry after the given number of minutes.
    #[error("account locked for {remaining_minutes} more minutes")]
    LockedOut { remaining_minutes: i64 },

    /// The unlock link is unknown, expired, or already used.
    #[error("invalid unlock token")]
    UnlockTokenInvalid,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Session(#[from] SessionTokenError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A successful admin login.
#[derive(Debug)]
pub struct AdminLogin {
    pub admin: CurrentAdmin,
    pub session_token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Audit entry for an attempt rejected by the lockout check, before the
/// password hash is consulted.
fn blocked_audit_entry(
    user_id: AdminUserId,
    remaining_minutes: i64,
) -> (&'static str, serde_json::Value) {
    (
        "admin.login_blocked",
        serde_json::json!({
            "admin_user_id": user_id,
            "remaining_minutes": remaining_minutes,
        }),
    )
}

/// Audit entry for a failed password verification: `failed` with the
/// countdown below the threshold, `locked_out` at it.
fn failure_audit_entry(
    user_id: AdminUserId,
    outcome: FailureOutcome,
) -> (&'static str, serde_json::Value) {
    match outcome {
        FailureOutcome::Failed { attempts_remaining } => (
            "admin.login_failed",
            serde_json::json!({
                "admin_user_id": user_id,
                "attempts_remaining": attempts_remaining,
            }),
        ),
        FailureOutcome::LockedOut { .. } => (
            "admin.locked_out",
            serde_json::json!({ "admin_user_id": user_id }),
        ),
    }
}

/// Mint an unlock token for a locked account and email the raw value.
///
/// Only the SHA-256 digest is persisted. Email delivery is best-effort: a
/// failed send is logged, never surfaced, since the lockout itself already
/// took effect.
pub(crate) async fn issue_unlock_token(
    pool: &PgPool,
    email_service: &EmailService,
    kind: UnlockAccountKind,
    account_id: i32,
    to: &Email,
    lockout_minutes: i64,
) -> Result<(), RepositoryError> {
    let raw = generate_token_value();
    let expires_at = Utc::now() + Duration::hours(UNLOCK_TOKEN_TTL_HOURS);

    UnlockTokenRepository::new(pool)
        .create(kind, account_id, &digest_token_value(&raw), expires_at)
        .await?;

    if let Err(e) = email_service
        .send_account_locked(to, lockout_minutes, &raw)
        .await
    {
        tracing::warn!(to = %to, error = %e, "failed to send account-locked email");
    }

    Ok(())
}

/// Admin login and unlock flows.
pub struct AdminAuthService<'a> {
    pool: &'a PgPool,
    email: &'a EmailService,
    sessions: &'a SessionIssuer,
}

impl<'a> AdminAuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, sessions: &'a SessionIssuer) -> Self {
        Self {
            pool,
            email,
            sessions,
        }
    }

    /// Verify a login id and password and mint an admin session.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::LockedOut` while a lockout window is open
    /// (without touching the password hash), and
    /// `AdminAuthError::InvalidCredentials` for everything that must stay
    /// indistinguishable to the caller.
    pub async fn login(
        &self,
        login_id: &Email,
        password: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<AdminLogin, AdminAuthError> {
        let users = AdminUserRepository::new(self.pool);
        let audit = AuditLogRepository::new(self.pool);
        let now = Utc::now();

        let Some(user) = users.get_by_login_id(login_id).await? else {
            return Err(AdminAuthError::InvalidCredentials {
                attempts_remaining: None,
            });
        };

        if !user.is_active {
            return Err(AdminAuthError::InvalidCredentials {
                attempts_remaining: None,
            });
        }

        let state = LockoutState {
            failed_attempts: user.failed_attempts,
            locked_until: user.locked_until,
        };
        if let Err(remaining_minutes) = lockout::check(state, now) {
            let (action, details) = blocked_audit_entry(user.id, remaining_minutes);
            audit.record(action, details, ip_address, user_agent).await;
            return Err(AdminAuthError::LockedOut { remaining_minutes });
        }

        if verify_password(password, &user.password_hash)? {
            users.record_login_success(user.id).await?;

            let admin = CurrentAdmin::from(&user);
            let (session_token, expires_at) = self.sessions.issue(admin.clone(), now)?;

            audit
                .record(
                    "admin.login",
                    serde_json::json!({ "admin_user_id": user.id }),
                    ip_address,
                    user_agent,
                )
                .await;

            return Ok(AdminLogin {
                admin,
                session_token,
                expires_at,
            });
        }

        let (next, outcome) = lockout::on_failure(LockoutPolicy::ADMIN, state, now);
        users
            .set_lockout_state(user.id, next.failed_attempts, next.locked_until)
            .await?;

        let (action, details) = failure_audit_entry(user.id, outcome);
        audit.record(action, details, ip_address, user_agent).await;

        match outcome {
            FailureOutcome::Failed { attempts_remaining } => {
                Err(AdminAuthError::InvalidCredentials {
                    attempts_remaining: Some(attempts_remaining),
                })
            }
            FailureOutcome::LockedOut { locked_until } => {
                issue_unlock_token(
                    self.pool,
                    self.email,
                    UnlockAccountKind::Admin,
                    user.id.as_i32(),
                    &user.login_id,
                    LockoutPolicy::ADMIN.lockout_minutes,
                )
                .await?;

                Err(AdminAuthError::LockedOut {
                    remaining_minutes: lockout::remaining_minutes(locked_until, now),
                })
            }
        }
    }

    /// Redeem an emailed unlock link. Clears the lockout on whichever kind
    /// of account the token was minted for.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::UnlockTokenInvalid` for an unknown, expired,
    /// or already-used token.
    pub async fn redeem_unlock_token(&self, raw_token: &str) -> Result<(), AdminAuthError> {
        let consumed = UnlockTokenRepository::new(self.pool)
            .consume(&digest_token_value(raw_token))
            .await?;

        let Some((kind, account_id)) = consumed else {
            return Err(AdminAuthError::UnlockTokenInvalid);
        };

        let unlocked_email = match kind {
            UnlockAccountKind::Admin => {
                let users = AdminUserRepository::new(self.pool);
                users
                    .set_lockout_state(machiya_core::AdminUserId::new(account_id), 0, None)
                    .await?;
                users
                    .get_by_id(machiya_core::AdminUserId::new(account_id))
                    .await?
                    .map(|user| user.login_id)
            }
            UnlockAccountKind::EditCredential => {
                let access = EditAccessRepository::new(self.pool);
                access
                    .set_credential_lockout_state(
                        machiya_core::EditCredentialId::new(account_id),
                        0,
                        None,
                    )
                    .await?;
                access
                    .get_credential_by_id(machiya_core::EditCredentialId::new(account_id))
                    .await?
                    .map(|credential| credential.email)
            }
        };

        AuditLogRepository::new(self.pool)
            .record(
                "account.unlocked",
                serde_json::json!({ "kind": match kind {
                    UnlockAccountKind::Admin => "admin",
                    UnlockAccountKind::EditCredential => "edit_credential",
                }, "account_id": account_id }),
                None,
                None,
            )
            .await;

        if let Some(to) = unlocked_email {
            if let Err(e) = self.email.send_account_unlocked(&to).await {
                tracing::warn!(to = %to, error = %e, "failed to send account-unlocked email");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_attempt_is_audited_with_countdown() {
        let (action, details) = blocked_audit_entry(AdminUserId::new(7), 12);
        assert_eq!(action, "admin.login_blocked");
        assert_eq!(details["admin_user_id"], 7);
        assert_eq!(details["remaining_minutes"], 12);
    }

    #[test]
    fn test_failed_attempt_is_audited_with_attempts_remaining() {
        let (action, details) = failure_audit_entry(
            AdminUserId::new(7),
            FailureOutcome::Failed {
                attempts_remaining: 3,
            },
        );
        assert_eq!(action, "admin.login_failed");
        assert_eq!(details["admin_user_id"], 7);
        assert_eq!(details["attempts_remaining"], 3);
    }

    #[test]
    fn test_lockout_trip_keeps_its_own_action() {
        let (action, details) = failure_audit_entry(
            AdminUserId::new(7),
            FailureOutcome::LockedOut {
                locked_until: Utc::now(),
            },
        );
        assert_eq!(action, "admin.locked_out");
        assert_eq!(details["admin_user_id"], 7);
    }
}
