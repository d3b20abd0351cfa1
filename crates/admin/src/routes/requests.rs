//! Edit request lifecycle route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use machiya_core::{DocumentStatus, EditRequestId, Email, RequestStatus, StoreId};

use crate::{
    error::AppError,
    middleware::auth::{RequireAdministrator, RequireReviewer},
    models::EditRequest,
    services::{
        RequestLifecycleService, RequestSubmission, StoreMatch,
        lifecycle::{ApprovalOutcome, CancellationOutcome},
    },
    state::AppState,
};

fn lifecycle(state: &AppState) -> RequestLifecycleService<'_> {
    RequestLifecycleService::new(state.pool(), state.email(), state.geocoder())
}

/// Public submission body.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub store_name: String,
    pub store_address: String,
    pub store_phone: Option<String>,
    pub applicant_name: String,
    pub applicant_email: String,
    pub applicant_phone: Option<String>,
    pub genre_id: Option<i32>,
    pub store_id: Option<i32>,
}

/// List filter.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<RequestStatus>,
}

/// Verify-documents body.
#[derive(Debug, Deserialize)]
pub struct VerifyDocumentsRequest {
    pub verdict: DocumentStatus,
}

/// Reject body.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
    pub notes: Option<String>,
}

/// Cancel-approval body.
#[derive(Debug, Default, Deserialize)]
pub struct CancelApprovalRequest {
    pub reason: Option<String>,
}

/// Approval response: the updated request plus operator-facing notes.
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub request: EditRequest,
    pub store_id: StoreId,
    pub password_note: String,
    pub account_reused: bool,
}

impl From<ApprovalOutcome> for ApprovalResponse {
    fn from(outcome: ApprovalOutcome) -> Self {
        Self {
            store_id: outcome.store.id,
            password_note: outcome.password_note,
            account_reused: outcome.account_reused,
            request: outcome.request,
        }
    }
}

/// Cancel-approval response with revocation counts.
#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub request: EditRequest,
    pub tokens_revoked: u64,
    pub sessions_revoked: u64,
}

impl From<CancellationOutcome> for CancellationResponse {
    fn from(outcome: CancellationOutcome) -> Self {
        Self {
            request: outcome.request,
            tokens_revoked: outcome.tokens_revoked,
            sessions_revoked: outcome.sessions_revoked,
        }
    }
}

/// `POST /api/requests` - public submission, no authentication.
#[instrument(skip(state, body))]
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<EditRequest>), AppError> {
    if body.store_name.trim().is_empty() || body.store_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "store name and address are required".to_string(),
        ));
    }
    let applicant_email = Email::parse(&body.applicant_email)
        .map_err(|e| AppError::BadRequest(format!("invalid applicant email: {e}")))?;

    let request = lifecycle(&state)
        .submit(&RequestSubmission {
            store_name: body.store_name.trim(),
            store_address: body.store_address.trim(),
            store_phone: body.store_phone.as_deref(),
            applicant_name: body.applicant_name.trim(),
            applicant_email: &applicant_email,
            applicant_phone: body.applicant_phone.as_deref(),
            genre_id: body.genre_id,
            store_id: body.store_id.map(StoreId::new),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /api/requests` - list requests, optionally filtered by status.
#[instrument(skip(state))]
pub async fn list(
    RequireReviewer(_admin): RequireReviewer,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EditRequest>>, AppError> {
    Ok(Json(lifecycle(&state).list(query.status).await?))
}

/// `GET /api/requests/{id}` - request detail.
#[instrument(skip(state))]
pub async fn show(
    RequireReviewer(_admin): RequireReviewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EditRequest>, AppError> {
    Ok(Json(lifecycle(&state).get(EditRequestId::new(id)).await?))
}

/// `POST /api/requests/{id}/verify-documents` - record a document verdict.
#[instrument(skip(admin, state))]
pub async fn verify_documents(
    RequireReviewer(admin): RequireReviewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<VerifyDocumentsRequest>,
) -> Result<Json<EditRequest>, AppError> {
    let request = lifecycle(&state)
        .verify_documents(EditRequestId::new(id), body.verdict, &admin)
        .await?;
    Ok(Json(request))
}

/// `POST /api/requests/{id}/approve` - approve and provision.
#[instrument(skip(admin, state))]
pub async fn approve(
    RequireReviewer(admin): RequireReviewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApprovalResponse>, AppError> {
    let outcome = lifecycle(&state)
        .approve(EditRequestId::new(id), &admin)
        .await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/requests/{id}/reject` - reject with a reason.
#[instrument(skip(admin, state, body))]
pub async fn reject(
    RequireReviewer(admin): RequireReviewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<EditRequest>, AppError> {
    if body.reason.trim().is_empty() {
        return Err(AppError::BadRequest("a rejection reason is required".to_string()));
    }
    let request = lifecycle(&state)
        .reject(
            EditRequestId::new(id),
            body.reason.trim(),
            body.notes.as_deref(),
            &admin,
        )
        .await?;
    Ok(Json(request))
}

/// `POST /api/requests/{id}/cancel-approval` - force rejected, revoke access.
#[instrument(skip(admin, state, body))]
pub async fn cancel_approval(
    RequireReviewer(admin): RequireReviewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<CancelApprovalRequest>,
) -> Result<Json<CancellationResponse>, AppError> {
    let outcome = lifecycle(&state)
        .cancel_approval(EditRequestId::new(id), body.reason.as_deref(), &admin)
        .await?;
    Ok(Json(outcome.into()))
}

/// `DELETE /api/requests/{id}` - delete a rejected request. Destructive,
/// so moderators are not allowed.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireAdministrator(admin): RequireAdministrator,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    lifecycle(&state).delete(EditRequestId::new(id), &admin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/requests/{id}/store-matches` - fuzzy matches for the reviewer.
#[instrument(skip(state))]
pub async fn store_matches(
    RequireReviewer(_admin): RequireReviewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<StoreMatch>>, AppError> {
    Ok(Json(
        lifecycle(&state).store_matches(EditRequestId::new(id)).await?,
    ))
}
