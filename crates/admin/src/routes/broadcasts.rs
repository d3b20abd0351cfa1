//! Broadcast quota route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Local;
use tracing::instrument;

use machiya_core::{AdminRole, StoreId};

use crate::{
    error::AppError,
    middleware::auth::RequireAdmin,
    models::{CurrentAdmin, QuotaStatus},
    services::QuotaEngine,
    state::AppState,
};

/// Store owners may only touch their own store; staff may touch any.
fn authorize_store(admin: &CurrentAdmin, store_id: StoreId) -> Result<(), AppError> {
    if admin.role == AdminRole::StoreOwner && admin.assigned_store_id != Some(store_id) {
        return Err(AppError::Forbidden(
            "not authorized for this store".to_string(),
        ));
    }
    Ok(())
}

/// `GET /api/stores/{id}/broadcast-quota` - current-week quota status.
#[instrument(skip(admin, state))]
pub async fn quota(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(store_id): Path<i32>,
) -> Result<Json<QuotaStatus>, AppError> {
    let store_id = StoreId::new(store_id);
    authorize_store(&admin, store_id)?;

    let today = Local::now().date_naive();
    let status = QuotaEngine::new(state.pool()).status(store_id, today).await?;
    Ok(Json(status))
}

/// `POST /api/stores/{id}/broadcasts` - consume one send from the quota.
#[instrument(skip(admin, state))]
pub async fn send(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(store_id): Path<i32>,
) -> Result<Json<QuotaStatus>, AppError> {
    let store_id = StoreId::new(store_id);
    authorize_store(&admin, store_id)?;

    let today = Local::now().date_naive();
    let status = QuotaEngine::new(state.pool())
        .record_send(store_id, today)
        .await?;
    Ok(Json(status))
}
