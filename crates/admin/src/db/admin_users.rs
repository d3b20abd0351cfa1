//! Admin user repository.
//!
//! Uses the sqlx runtime query API with row structs converted into domain
//! models via `TryFrom`, so the crate builds without a live database.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use machiya_core::{AdminRole, AdminUserId, Email, StoreId};

use super::RepositoryError;
use crate::models::AdminUser;

/// Internal row type for admin user queries.
#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    id: i32,
    login_id: String,
    password_hash: String,
    display_name: String,
    role: AdminRole,
    assigned_store_id: Option<i32>,
    is_active: bool,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AdminUserRow> for AdminUser {
    type Error = RepositoryError;

    fn try_from(row: AdminUserRow) -> Result<Self, Self::Error> {
        let login_id = Email::parse(&row.login_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid login id in database: {e}"))
        })?;

        Ok(Self {
            id: AdminUserId::new(row.id),
            login_id,
            password_hash: row.password_hash,
            display_name: row.display_name,
            role: row.role,
            assigned_store_id: row.assigned_store_id.map(StoreId::new),
            is_active: row.is_active,
            failed_attempts: row.failed_attempts,
            locked_until: row.locked_until,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, login_id, password_hash, display_name, role, \
     assigned_store_id, is_active, failed_attempts, locked_until, last_login_at, \
     created_at, updated_at";

/// Repository for admin user database operations.
pub struct AdminUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminUserRepository<'a> {
    /// Create a new admin user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an admin user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM admin_users WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an admin user by their login id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_login_id(
        &self,
        login_id: &Email,
    ) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM admin_users WHERE login_id = $1"
        ))
        .bind(login_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a new admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the login id already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        login_id: &Email,
        password_hash: &str,
        display_name: &str,
        role: AdminRole,
        assigned_store_id: Option<StoreId>,
    ) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "INSERT INTO admin_users (login_id, password_hash, display_name, role, assigned_store_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(login_id.as_str())
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .bind(assigned_store_id.map(|id| id.as_i32()))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "login id already exists"))?;

        row.try_into()
    }

    /// Re-point an existing account at a store and reactivate it.
    ///
    /// Used when an applicant who already holds an account is re-approved;
    /// the password is deliberately left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn reassign_store(
        &self,
        id: AdminUserId,
        store_id: StoreId,
    ) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "UPDATE admin_users \
             SET assigned_store_id = $1, is_active = TRUE, updated_at = now() \
             WHERE id = $2 \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(store_id.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Persist lockout state after a failed login attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_lockout_state(
        &self,
        id: AdminUserId,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE admin_users \
             SET failed_attempts = $1, locked_until = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(failed_attempts)
        .bind(locked_until)
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Reset the failure counter and stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn record_login_success(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE admin_users \
             SET failed_attempts = 0, locked_until = NULL, last_login_at = now(), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete an admin user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn delete(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM admin_users WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
