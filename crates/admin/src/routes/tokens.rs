//! Edit token administration route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use machiya_core::{EditRequestId, EditTokenId, Email};

use crate::{
    db::EditAccessRepository,
    error::AppError,
    middleware::auth::{RequireAdministrator, RequireReviewer},
    models::{EditCredential, EditToken},
    services::TokenAuthority,
    state::AppState,
};

/// Credential gate configuration body.
#[derive(Debug, Deserialize)]
pub struct SetCredentialRequest {
    pub email: String,
    pub password: String,
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,
}

const fn default_require_auth() -> bool {
    true
}

fn authority(state: &AppState) -> TokenAuthority<'_> {
    TokenAuthority::new(state.pool(), state.email(), state.edit_sessions())
}

/// `POST /api/requests/{id}/tokens` - issue a token for an approved request.
#[instrument(skip(state))]
pub async fn issue(
    RequireReviewer(_admin): RequireReviewer,
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
) -> Result<(StatusCode, Json<EditToken>), AppError> {
    let token = authority(&state)
        .issue_token(EditRequestId::new(request_id))
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// `GET /api/requests/{id}/tokens` - list tokens issued for a request.
#[instrument(skip(state))]
pub async fn list_for_request(
    RequireReviewer(_admin): RequireReviewer,
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
) -> Result<Json<Vec<EditToken>>, AppError> {
    let tokens = EditAccessRepository::new(state.pool())
        .list_tokens_for_request(EditRequestId::new(request_id))
        .await?;
    Ok(Json(tokens))
}

/// `POST /api/tokens/{id}/deactivate` - revoke a token. Destructive,
/// so moderators are not allowed.
#[instrument(skip(state))]
pub async fn deactivate(
    RequireAdministrator(_admin): RequireAdministrator,
    State(state): State<AppState>,
    Path(token_id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    authority(&state)
        .deactivate_token(EditTokenId::new(token_id))
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `PUT /api/tokens/{id}/credential` - configure the credential gate.
#[instrument(skip(state, body))]
pub async fn set_credential(
    RequireReviewer(_admin): RequireReviewer,
    State(state): State<AppState>,
    Path(token_id): Path<i32>,
    Json(body): Json<SetCredentialRequest>,
) -> Result<Json<EditCredential>, AppError> {
    let email = Email::parse(&body.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
    if body.password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let credential = authority(&state)
        .set_credential(
            EditTokenId::new(token_id),
            &email,
            &body.password,
            body.require_auth,
        )
        .await?;
    Ok(Json(credential))
}
