//! Self-service edit access models: tokens, credentials, sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use machiya_core::{EditCredentialId, EditRequestId, EditSessionId, EditTokenId, Email, StoreId};

/// A persistent capability token granting edit access to one store.
///
/// Tokens never expire by time or use-count; they are revoked only by
/// explicit deactivation (admin action or cancel-approval).
#[derive(Debug, Clone, Serialize)]
pub struct EditToken {
    pub id: EditTokenId,
    pub request_id: EditRequestId,
    pub store_id: StoreId,
    pub token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Optional email/password gate layered on an [`EditToken`].
///
/// When absent, or present with `require_auth = false`, the token alone
/// grants edit access.
#[derive(Debug, Clone, Serialize)]
pub struct EditCredential {
    pub id: EditCredentialId,
    pub token_id: EditTokenId,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub require_auth: bool,
    pub is_active: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A time-boxed session proving an [`EditCredential`] challenge was passed.
///
/// The signed cookie and this server-side row must both agree; an expired or
/// inactive row makes a syntactically valid cookie unauthenticated.
#[derive(Debug, Clone, Serialize)]
pub struct EditSession {
    pub id: EditSessionId,
    pub token_id: EditTokenId,
    pub credential_id: EditCredentialId,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
