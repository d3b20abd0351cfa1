//! HTTP route handlers for the admin back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness check
//! GET  /health/ready                        - Readiness check (pings the database)
//!
//! # Admin auth
//! POST /api/auth/login                      - Admin login (lockout-guarded)
//! POST /api/auth/logout                     - Clear the session cookie
//! POST /api/auth/unlock                     - Redeem a single-use unlock token
//! GET  /api/auth/me                         - Current admin identity
//!
//! # Edit requests
//! POST   /api/requests                      - Public submission
//! GET    /api/requests                      - List (reviewer)
//! GET    /api/requests/{id}                 - Detail (reviewer)
//! POST   /api/requests/{id}/verify-documents
//! POST   /api/requests/{id}/approve
//! POST   /api/requests/{id}/reject
//! POST   /api/requests/{id}/cancel-approval
//! DELETE /api/requests/{id}
//! GET    /api/requests/{id}/store-matches
//!
//! # Edit tokens (reviewer)
//! POST /api/requests/{id}/tokens            - Issue a token
//! GET  /api/requests/{id}/tokens            - List tokens
//! POST /api/tokens/{id}/deactivate
//! PUT  /api/tokens/{id}/credential
//!
//! # Self-service store edit (token-keyed)
//! GET  /api/edit/{token}/auth
//! POST /api/edit/{token}/login
//! POST /api/edit/{token}/logout
//! GET  /api/edit/{token}/store
//! PUT  /api/edit/{token}/store
//!
//! # Broadcast quota
//! GET  /api/stores/{id}/broadcast-quota
//! POST /api/stores/{id}/broadcasts
//! ```

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
};

use crate::state::AppState;

pub mod auth;
pub mod broadcasts;
pub mod requests;
pub mod store_edit;
pub mod tokens;

/// Client IP (first `x-forwarded-for` hop) and user agent, as recorded in
/// the audit trail.
pub(crate) fn client_meta(headers: &HeaderMap) -> (Option<&str>, Option<&str>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim());
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok());
    (ip, user_agent)
}

/// Build the full application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        // Admin auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/unlock", post(auth::unlock))
        .route("/api/auth/me", get(auth::me))
        // Edit requests
        .route("/api/requests", post(requests::submit).get(requests::list))
        .route(
            "/api/requests/{id}",
            get(requests::show).delete(requests::delete),
        )
        .route(
            "/api/requests/{id}/verify-documents",
            post(requests::verify_documents),
        )
        .route("/api/requests/{id}/approve", post(requests::approve))
        .route("/api/requests/{id}/reject", post(requests::reject))
        .route(
            "/api/requests/{id}/cancel-approval",
            post(requests::cancel_approval),
        )
        .route(
            "/api/requests/{id}/store-matches",
            get(requests::store_matches),
        )
        // Edit tokens
        .route(
            "/api/requests/{id}/tokens",
            post(tokens::issue).get(tokens::list_for_request),
        )
        .route("/api/tokens/{id}/deactivate", post(tokens::deactivate))
        .route("/api/tokens/{id}/credential", put(tokens::set_credential))
        // Self-service store edit
        .route("/api/edit/{token}/auth", get(store_edit::check_auth))
        .route("/api/edit/{token}/login", post(store_edit::login))
        .route("/api/edit/{token}/logout", post(store_edit::logout))
        .route(
            "/api/edit/{token}/store",
            get(store_edit::get_store).put(store_edit::update_store),
        )
        // Broadcast quota
        .route("/api/stores/{id}/broadcast-quota", get(broadcasts::quota))
        .route("/api/stores/{id}/broadcasts", post(broadcasts::send))
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}

/// Readiness probe: verifies the database answers.
async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(state.pool())
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(serde_json::json!({ "status": "ready" })))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::client_meta;

    #[test]
    fn test_client_meta_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("user-agent", HeaderValue::from_static("test-agent"));

        let (ip, user_agent) = client_meta(&headers);
        assert_eq!(ip, Some("203.0.113.9"));
        assert_eq!(user_agent, Some("test-agent"));
    }

    #[test]
    fn test_client_meta_tolerates_missing_headers() {
        let headers = HeaderMap::new();
        let (ip, user_agent) = client_meta(&headers);
        assert_eq!(ip, None);
        assert_eq!(user_agent, None);
    }
}
