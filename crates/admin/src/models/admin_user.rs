//! Admin and store-owner account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use machiya_core::{AdminRole, AdminUserId, Email, StoreId};

/// A back-office account.
///
/// Covers both internal staff (`super_admin`/`admin`/`moderator`) and
/// self-service `store_owner` accounts created by request approval. A
/// `store_owner` always has `assigned_store_id` set.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub id: AdminUserId,
    /// Login identifier; the applicant email for store-owner accounts.
    pub login_id: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub role: AdminRole,
    pub assigned_store_id: Option<StoreId>,
    pub is_active: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cookie-stored admin identity.
///
/// Minimal claims embedded in the signed admin session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    pub id: AdminUserId,
    pub login_id: Email,
    pub display_name: String,
    pub role: AdminRole,
    pub assigned_store_id: Option<StoreId>,
}

impl From<&AdminUser> for CurrentAdmin {
    fn from(user: &AdminUser) -> Self {
        Self {
            id: user.id,
            login_id: user.login_id.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            assigned_store_id: user.assigned_store_id,
        }
    }
}
