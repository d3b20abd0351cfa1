//! Self-service store edit route handlers.
//!
//! All routes are keyed by the opaque edit token in the path; the optional
//! session cookie carries credential-gate proof.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use machiya_core::{Email, StoreId};

use crate::{
    db::{RepositoryError, StoreRepository, stores::StoreUpdate},
    error::AppError,
    models::Store,
    routes::client_meta,
    services::{AuthDenialReason, CheckAuthOutcome, TokenAuthority},
    state::AppState,
};

/// Name of the store-edit session cookie.
pub const EDIT_SESSION_COOKIE: &str = "machiya_edit_session";

/// Credential login body.
#[derive(Debug, Deserialize)]
pub struct EditLoginRequest {
    pub email: String,
    pub password: String,
}

/// Authentication check response.
#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub store_id: StoreId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<AuthDenialReason>,
}

fn authority(state: &AppState) -> TokenAuthority<'_> {
    TokenAuthority::new(state.pool(), state.email(), state.edit_sessions())
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((EDIT_SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Resolve the token and require the credential gate (if any) to be
/// satisfied. Returns the store ID the token grants access to.
async fn require_edit_access(
    state: &AppState,
    token_value: &str,
    jar: &CookieJar,
) -> Result<StoreId, AppError> {
    let cookie = jar.get(EDIT_SESSION_COOKIE).map(Cookie::value);
    let (token, outcome) = authority(state).check_auth(token_value, cookie).await?;

    match outcome {
        CheckAuthOutcome::Open | CheckAuthOutcome::Authenticated { .. } => Ok(token.store_id),
        CheckAuthOutcome::Denied { .. } => {
            Err(AppError::Unauthorized("credential login required".to_string()))
        }
    }
}

/// `GET /api/edit/{token}/auth` - report gate status for the edit page.
#[instrument(skip(state, jar))]
pub async fn check_auth(
    State(state): State<AppState>,
    Path(token_value): Path<String>,
    jar: CookieJar,
) -> Result<Json<AuthStatusResponse>, AppError> {
    let cookie = jar.get(EDIT_SESSION_COOKIE).map(Cookie::value);
    let (token, outcome) = authority(&state).check_auth(&token_value, cookie).await?;

    let response = match outcome {
        CheckAuthOutcome::Open => AuthStatusResponse {
            authenticated: true,
            store_id: token.store_id,
            expires_at: None,
            reason: None,
        },
        CheckAuthOutcome::Authenticated { expires_at, .. } => AuthStatusResponse {
            authenticated: true,
            store_id: token.store_id,
            expires_at: Some(expires_at),
            reason: None,
        },
        CheckAuthOutcome::Denied { reason } => AuthStatusResponse {
            authenticated: false,
            store_id: token.store_id,
            expires_at: None,
            reason: Some(reason),
        },
    };

    Ok(Json(response))
}

/// `POST /api/edit/{token}/login` - pass the credential gate.
#[instrument(skip(state, jar, body))]
pub async fn login(
    State(state): State<AppState>,
    Path(token_value): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<EditLoginRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let email = Email::parse(&body.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
    let (ip, user_agent) = client_meta(&headers);

    let login = authority(&state)
        .login(&token_value, &email, &body.password, ip, user_agent)
        .await?;

    Ok((
        jar.add(session_cookie(login.session_token)),
        Json(serde_json::json!({
            "ok": true,
            "expires_at": login.session.expires_at,
        })),
    ))
}

/// `POST /api/edit/{token}/logout` - end the session.
#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    Path(token_value): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    if let Some(cookie) = jar.get(EDIT_SESSION_COOKIE) {
        authority(&state).logout(&token_value, cookie.value()).await?;
    }

    Ok((
        jar.remove(Cookie::from(EDIT_SESSION_COOKIE)),
        Json(serde_json::json!({ "ok": true })),
    ))
}

/// `GET /api/edit/{token}/store` - read the store behind the token.
#[instrument(skip(state, jar))]
pub async fn get_store(
    State(state): State<AppState>,
    Path(token_value): Path<String>,
    jar: CookieJar,
) -> Result<Json<Store>, AppError> {
    let store_id = require_edit_access(&state, &token_value, &jar).await?;
    let store = StoreRepository::new(state.pool())
        .get_by_id(store_id)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(Json(store))
}

/// `PUT /api/edit/{token}/store` - update the store behind the token.
///
/// Unknown fields in the body are rejected; the self-service surface
/// can touch only name, address, and phone.
#[instrument(skip(state, jar, update))]
pub async fn update_store(
    State(state): State<AppState>,
    Path(token_value): Path<String>,
    jar: CookieJar,
    Json(update): Json<StoreUpdate>,
) -> Result<Json<Store>, AppError> {
    if update.name.trim().is_empty() || update.address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "store name and address are required".to_string(),
        ));
    }

    let store_id = require_edit_access(&state, &token_value, &jar).await?;
    let store = StoreRepository::new(state.pool())
        .update(store_id, &update)
        .await?;
    Ok(Json(store))
}
