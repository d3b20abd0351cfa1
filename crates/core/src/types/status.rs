//! Status enums for requests and admin accounts.

use serde::{Deserialize, Serialize};

/// Review status of a store-edit request.
///
/// Lifecycle: `pending → verified → {approved, rejected}`. `approved` can be
/// reverted to `rejected` through an explicit cancel-approval transition;
/// `rejected` is terminal but the request may be physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "request_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Verified,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Whether an approve or reject decision is valid from this status.
    #[must_use]
    pub const fn is_decidable(self) -> bool {
        matches!(self, Self::Pending | Self::Verified)
    }

    /// Whether cancel-approval is valid from this status.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Whether the request row may be physically deleted.
    #[must_use]
    pub const fn is_deletable(self) -> bool {
        matches!(self, Self::Rejected)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Verified => write!(f, "verified"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("invalid request status: {s}")),
        }
    }
}

/// Document verification status, tracked independently of [`RequestStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "document_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Verified => write!(f, "verified"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("invalid document status: {s}")),
        }
    }
}

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access to all features including admin-user management.
    SuperAdmin,
    /// Full access to request review and master data.
    Admin,
    /// Review access without destructive operations.
    Moderator,
    /// Self-service account bound to a single store.
    StoreOwner,
}

impl AdminRole {
    /// Whether this role may review (approve/reject) edit requests.
    #[must_use]
    pub const fn can_review(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin | Self::Moderator)
    }

    /// Whether this role may perform destructive operations
    /// (request deletion, token deactivation).
    #[must_use]
    pub const fn can_administer(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::Moderator => write!(f, "moderator"),
            Self::StoreOwner => write!(f, "store_owner"),
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "store_owner" => Ok(Self::StoreOwner),
            _ => Err(format!("invalid admin role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        assert!(RequestStatus::Pending.is_decidable());
        assert!(RequestStatus::Verified.is_decidable());
        assert!(!RequestStatus::Approved.is_decidable());
        assert!(!RequestStatus::Rejected.is_decidable());
    }

    #[test]
    fn test_cancel_only_from_approved() {
        assert!(RequestStatus::Approved.is_cancellable());
        assert!(!RequestStatus::Pending.is_cancellable());
        assert!(!RequestStatus::Verified.is_cancellable());
        assert!(!RequestStatus::Rejected.is_cancellable());
    }

    #[test]
    fn test_delete_only_from_rejected() {
        assert!(RequestStatus::Rejected.is_deletable());
        assert!(!RequestStatus::Pending.is_deletable());
        assert!(!RequestStatus::Approved.is_deletable());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Verified,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            let parsed: RequestStatus = status.to_string().parse().expect("roundtrip");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_role_permissions() {
        assert!(AdminRole::SuperAdmin.can_administer());
        assert!(AdminRole::Admin.can_administer());
        assert!(!AdminRole::Moderator.can_administer());
        assert!(AdminRole::Moderator.can_review());
        assert!(!AdminRole::StoreOwner.can_review());
    }

    #[test]
    fn test_role_string_roundtrip() {
        for role in [
            AdminRole::SuperAdmin,
            AdminRole::Admin,
            AdminRole::Moderator,
            AdminRole::StoreOwner,
        ] {
            let parsed: AdminRole = role.to_string().parse().expect("roundtrip");
            assert_eq!(parsed, role);
        }
    }
}
