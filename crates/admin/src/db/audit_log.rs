//! Append-only audit log repository.

use sqlx::PgPool;

use super::RepositoryError;

/// Repository for the append-only audit log.
pub struct AuditLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditLogRepository<'a> {
    /// Create a new audit log repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an audit entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn append(
        &self,
        action: &str,
        details: &serde_json::Value,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO audit_log (action, details, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(action)
        .bind(details)
        .bind(ip_address)
        .bind(user_agent)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Append an audit entry, logging instead of failing.
    ///
    /// Audit failures never roll back the action they describe.
    pub async fn record(
        &self,
        action: &str,
        details: serde_json::Value,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) {
        if let Err(e) = self.append(action, &details, ip_address, user_agent).await {
            tracing::warn!(action, error = %e, "failed to write audit log entry");
        }
    }
}
