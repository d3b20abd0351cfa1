//! Unified error handling for the admin back-office.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::admin_auth::AdminAuthError;
use crate::services::email::EmailError;
use crate::services::lifecycle::LifecycleError;
use crate::services::password::PasswordError;
use crate::services::quota::QuotaError;
use crate::services::session::SessionTokenError;
use crate::services::token_authority::TokenAuthorityError;

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Failed login attempt; carries the remaining-attempts countdown when
    /// a real account absorbed the failure.
    #[error("Invalid credentials")]
    InvalidCredentials { attempts_remaining: Option<i32> },

    /// Account or credential gate is locked.
    #[error("Account locked, retry in {remaining_minutes} minutes")]
    LockedOut { remaining_minutes: i64 },

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// State conflict (duplicate value, wrong lifecycle status).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LifecycleError> for AppError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::NotFound => Self::NotFound("request".to_string()),
            LifecycleError::InvalidStatus { status } => {
                Self::Conflict(format!("request is {status}"))
            }
            LifecycleError::Password(e) => Self::Internal(e.to_string()),
            LifecycleError::Repository(e) => e.into(),
        }
    }
}

impl From<AdminAuthError> for AppError {
    fn from(e: AdminAuthError) -> Self {
        match e {
            AdminAuthError::InvalidCredentials { attempts_remaining } => {
                Self::InvalidCredentials { attempts_remaining }
            }
            AdminAuthError::LockedOut { remaining_minutes } => {
                Self::LockedOut { remaining_minutes }
            }
            AdminAuthError::UnlockTokenInvalid => {
                Self::BadRequest("invalid or expired unlock token".to_string())
            }
            AdminAuthError::Password(e) => Self::Internal(e.to_string()),
            AdminAuthError::Session(e) => Self::Internal(e.to_string()),
            AdminAuthError::Repository(e) => e.into(),
        }
    }
}

impl From<TokenAuthorityError> for AppError {
    fn from(e: TokenAuthorityError) -> Self {
        match e {
            TokenAuthorityError::TokenNotFound => Self::NotFound("edit token".to_string()),
            TokenAuthorityError::TokenRevoked => {
                Self::Forbidden("edit token has been revoked".to_string())
            }
            TokenAuthorityError::RequestNotApproved => {
                Self::Conflict("request is not approved".to_string())
            }
            TokenAuthorityError::NoCredential => {
                Self::Conflict("no credential configured for this token".to_string())
            }
            TokenAuthorityError::InvalidCredentials { attempts_remaining } => {
                Self::InvalidCredentials { attempts_remaining }
            }
            TokenAuthorityError::LockedOut { remaining_minutes } => {
                Self::LockedOut { remaining_minutes }
            }
            TokenAuthorityError::Password(e) => Self::Internal(e.to_string()),
            TokenAuthorityError::Session(e) => Self::Internal(e.to_string()),
            TokenAuthorityError::Repository(e) => e.into(),
        }
    }
}

impl From<QuotaError> for AppError {
    fn from(e: QuotaError) -> Self {
        match e {
            QuotaError::FeatureDisabled => {
                Self::Forbidden("broadcasts are not available on this plan".to_string())
            }
            QuotaError::QuotaExhausted => {
                Self::Conflict("weekly broadcast quota exhausted".to_string())
            }
            QuotaError::Repository(e) => e.into(),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<SessionTokenError> for AppError {
    fn from(e: SessionTokenError) -> Self {
        match e {
            SessionTokenError::Invalid | SessionTokenError::Expired => {
                Self::Unauthorized("session invalid or expired".to_string())
            }
            SessionTokenError::Signing(e) => Self::Internal(e),
        }
    }
}

impl From<EmailError> for AppError {
    fn from(e: EmailError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let status = match &self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(e) => match e {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) | Self::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            Self::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        // Don't expose internal error details to clients
        let body = match &self {
            Self::Internal(_) => serde_json::json!({ "error": "Internal server error" }),
            Self::Database(e) => match e {
                RepositoryError::NotFound => serde_json::json!({ "error": "Not found" }),
                RepositoryError::Conflict(message) => serde_json::json!({ "error": message }),
                _ => serde_json::json!({ "error": "Internal server error" }),
            },
            Self::InvalidCredentials { attempts_remaining } => serde_json::json!({
                "error": "Invalid credentials",
                "attempts_remaining": attempts_remaining,
            }),
            Self::LockedOut { remaining_minutes } => serde_json::json!({
                "error": self.to_string(),
                "remaining_minutes": remaining_minutes,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Set the Sentry user context from an admin user ID.
pub fn set_sentry_user(admin_user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("request".to_string());
        assert_eq!(err.to_string(), "Not found: request");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::InvalidCredentials {
                attempts_remaining: Some(2)
            }),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::LockedOut {
                remaining_minutes: 12
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_lifecycle_status_conflict_maps_to_409() {
        let err: AppError = LifecycleError::InvalidStatus {
            status: machiya_core::RequestStatus::Approved,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_repository_not_found_maps_to_404() {
        let err: AppError = RepositoryError::NotFound.into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
