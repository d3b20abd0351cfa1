//! Database operations for the admin `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `stores` - Store listings
//! - `admin_users` - Back-office and store-owner accounts
//! - `edit_requests` - Store-listing edit requests under review
//! - `edit_tokens` / `edit_credentials` / `edit_sessions` - Self-service edit access
//! - `weekly_broadcast_limits` - Per-store weekly broadcast counters
//! - `audit_log` - Append-only security event log
//! - `unlock_tokens` - Single-use account unlock tokens
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p machiya-cli -- migrate
//! ```

pub mod admin_users;
pub mod audit_log;
pub mod broadcast_limits;
pub mod edit_access;
pub mod edit_requests;
pub mod stores;
pub mod unlock_tokens;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use admin_users::AdminUserRepository;
pub use audit_log::AuditLogRepository;
pub use broadcast_limits::BroadcastLimitRepository;
pub use edit_access::EditAccessRepository;
pub use edit_requests::EditRequestRepository;
pub use stores::StoreRepository;
pub use unlock_tokens::UnlockTokenRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate login id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a sqlx error to `Conflict` when it is a unique violation,
    /// otherwise wrap it as `Database`.
    fn from_unique_violation(e: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict_message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
