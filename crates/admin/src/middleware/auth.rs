//! Authentication extractors for admin routes.
//!
//! The admin identity travels in a signed cookie; extractors verify the
//! signature against the admin session issuer and hand the claims to the
//! handler. No server-side row backs admin sessions - revocation happens
//! by deactivating the account.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::models::CurrentAdmin;
use crate::services::session::AdminSessionClaims;
use crate::state::AppState;

/// Name of the admin session cookie.
pub const ADMIN_SESSION_COOKIE: &str = "machiya_admin_session";

/// Extractor that requires a valid admin session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdmin(admin): RequireAdmin,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.display_name)
/// }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

/// Extractor that additionally requires a role with review rights
/// (`super_admin`, `admin`, or `moderator`).
pub struct RequireReviewer(pub CurrentAdmin);

/// Extractor that requires a role with destructive rights
/// (`super_admin` or `admin`). Moderators can review but not delete
/// requests or revoke tokens.
pub struct RequireAdministrator(pub CurrentAdmin);

/// Rejection for the auth extractors.
pub enum AuthRejection {
    Unauthorized,
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn current_admin(parts: &Parts, state: &AppState) -> Result<CurrentAdmin, AuthRejection> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar
        .get(ADMIN_SESSION_COOKIE)
        .ok_or(AuthRejection::Unauthorized)?;

    let claims = state
        .admin_sessions()
        .verify::<AdminSessionClaims>(cookie.value())
        .map_err(|_| AuthRejection::Unauthorized)?;

    Ok(claims.data)
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        current_admin(parts, &state).map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireReviewer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let admin = current_admin(parts, &state)?;
        if !admin.role.can_review() {
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(admin))
    }
}

impl<S> FromRequestParts<S> for RequireAdministrator
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let admin = current_admin(parts, &state)?;
        if !admin.role.can_administer() {
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(admin))
    }
}

