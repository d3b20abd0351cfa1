//! Admin authentication route handlers.

use axum::{Json, extract::State, http::HeaderMap};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use machiya_core::{AdminRole, Email};

use crate::{
    error::{AppError, clear_sentry_user, set_sentry_user},
    middleware::auth::{ADMIN_SESSION_COOKIE, RequireAdmin},
    models::CurrentAdmin,
    routes::client_meta,
    services::{AdminAuthService, QuotaEngine},
    state::AppState,
};

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
}

/// Unlock request body.
#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub token: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub admin: CurrentAdmin,
    pub expires_at: DateTime<Utc>,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((ADMIN_SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

/// `POST /api/auth/login` - verify credentials and set the session cookie.
#[instrument(skip(state, jar, body))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let login_id = Email::parse(&body.login_id)
        .map_err(|e| AppError::BadRequest(format!("invalid login id: {e}")))?;
    let (ip, user_agent) = client_meta(&headers);

    let auth = AdminAuthService::new(state.pool(), state.email(), state.admin_sessions());
    let login = auth.login(&login_id, &body.password, ip, user_agent).await?;

    set_sentry_user(login.admin.id.as_i32(), Some(login.admin.login_id.as_str()));

    // Store owners get their weekly broadcast counter prepared at login.
    if login.admin.role == AdminRole::StoreOwner
        && let Some(store_id) = login.admin.assigned_store_id
    {
        let today = Local::now().date_naive();
        if let Err(e) = QuotaEngine::new(state.pool())
            .initialize_week(store_id, today)
            .await
        {
            tracing::warn!(store_id = %store_id, error = %e, "failed to prepare broadcast week");
        }
    }

    Ok((
        jar.add(session_cookie(login.session_token)),
        Json(LoginResponse {
            admin: login.admin,
            expires_at: login.expires_at,
        }),
    ))
}

/// `POST /api/auth/logout` - clear the session cookie.
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    clear_sentry_user();
    (
        jar.remove(Cookie::from(ADMIN_SESSION_COOKIE)),
        Json(serde_json::json!({ "ok": true })),
    )
}

/// `POST /api/auth/unlock` - redeem a single-use unlock token.
#[instrument(skip(state, body))]
pub async fn unlock(
    State(state): State<AppState>,
    Json(body): Json<UnlockRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = AdminAuthService::new(state.pool(), state.email(), state.admin_sessions());
    auth.redeem_unlock_token(&body.token).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/auth/me` - return the authenticated admin's identity.
#[instrument(skip(admin))]
pub async fn me(RequireAdmin(admin): RequireAdmin) -> Json<CurrentAdmin> {
    Json(admin)
}
