//! Edit request repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use machiya_core::{AdminUserId, DocumentStatus, EditRequestId, Email, RequestStatus, StoreId};

use super::RepositoryError;
use crate::models::EditRequest;

/// Internal row type for edit request queries.
#[derive(Debug, sqlx::FromRow)]
struct EditRequestRow {
    id: i32,
    store_name: String,
    store_address: String,
    store_phone: Option<String>,
    applicant_name: String,
    applicant_email: String,
    applicant_phone: Option<String>,
    genre_id: Option<i32>,
    store_id: Option<i32>,
    status: RequestStatus,
    document_verification_status: DocumentStatus,
    rejection_reason: Option<String>,
    admin_notes: Option<String>,
    generated_password: Option<String>,
    processed_by: Option<i32>,
    processed_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EditRequestRow> for EditRequest {
    type Error = RepositoryError;

    fn try_from(row: EditRequestRow) -> Result<Self, Self::Error> {
        let applicant_email = Email::parse(&row.applicant_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid applicant email in database: {e}"))
        })?;

        Ok(Self {
            id: EditRequestId::new(row.id),
            store_name: row.store_name,
            store_address: row.store_address,
            store_phone: row.store_phone,
            applicant_name: row.applicant_name,
            applicant_email,
            applicant_phone: row.applicant_phone,
            genre_id: row.genre_id,
            store_id: row.store_id.map(StoreId::new),
            status: row.status,
            document_verification_status: row.document_verification_status,
            rejection_reason: row.rejection_reason,
            admin_notes: row.admin_notes,
            generated_password: row.generated_password,
            processed_by: row.processed_by.map(AdminUserId::new),
            processed_at: row.processed_at,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, store_name, store_address, store_phone, applicant_name, \
     applicant_email, applicant_phone, genre_id, store_id, status, \
     document_verification_status, rejection_reason, admin_notes, generated_password, \
     processed_by, processed_at, reviewed_at, created_at";

/// Fields of a newly submitted edit request.
#[derive(Debug, Clone)]
pub struct NewEditRequest<'a> {
    pub store_name: &'a str,
    pub store_address: &'a str,
    pub store_phone: Option<&'a str>,
    pub applicant_name: &'a str,
    pub applicant_email: &'a Email,
    pub applicant_phone: Option<&'a str>,
    pub genre_id: Option<i32>,
    pub store_id: Option<StoreId>,
}

/// Repository for edit request database operations.
pub struct EditRequestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EditRequestRepository<'a> {
    /// Create a new edit request repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new pending request from public input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, request: &NewEditRequest<'_>) -> Result<EditRequest, RepositoryError> {
        let row = sqlx::query_as::<_, EditRequestRow>(&format!(
            "INSERT INTO edit_requests \
             (store_name, store_address, store_phone, applicant_name, applicant_email, \
              applicant_phone, genre_id, store_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(request.store_name)
        .bind(request.store_address)
        .bind(request.store_phone)
        .bind(request.applicant_name)
        .bind(request.applicant_email.as_str())
        .bind(request.applicant_phone)
        .bind(request.genre_id)
        .bind(request.store_id.map(|id| id.as_i32()))
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get a request by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(
        &self,
        id: EditRequestId,
    ) -> Result<Option<EditRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, EditRequestRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM edit_requests WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List requests, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<EditRequest>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, EditRequestRow>(&format!(
                    "SELECT {SELECT_COLUMNS} FROM edit_requests \
                     WHERE status = $1 ORDER BY created_at DESC"
                ))
                .bind(status)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, EditRequestRow>(&format!(
                    "SELECT {SELECT_COLUMNS} FROM edit_requests ORDER BY created_at DESC"
                ))
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Set the document verification status only; `status` is untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the request doesn't exist.
    pub async fn set_document_status(
        &self,
        id: EditRequestId,
        document_status: DocumentStatus,
        reviewer: AdminUserId,
    ) -> Result<EditRequest, RepositoryError> {
        let row = sqlx::query_as::<_, EditRequestRow>(&format!(
            "UPDATE edit_requests \
             SET document_verification_status = $1, reviewed_at = now(), processed_by = $2 \
             WHERE id = $3 \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(document_status)
        .bind(reviewer.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Mark a request approved, binding it to a store and recording the
    /// password text shown to operators.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the request doesn't exist.
    pub async fn mark_approved(
        &self,
        id: EditRequestId,
        store_id: StoreId,
        generated_password: &str,
        processed_by: AdminUserId,
    ) -> Result<EditRequest, RepositoryError> {
        let row = sqlx::query_as::<_, EditRequestRow>(&format!(
            "UPDATE edit_requests \
             SET status = 'approved', store_id = $1, generated_password = $2, \
                 processed_by = $3, processed_at = now(), reviewed_at = now() \
             WHERE id = $4 \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(store_id.as_i32())
        .bind(generated_password)
        .bind(processed_by.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Mark a request rejected with a reason and optional notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the request doesn't exist.
    pub async fn mark_rejected(
        &self,
        id: EditRequestId,
        reason: &str,
        notes: Option<&str>,
        processed_by: AdminUserId,
    ) -> Result<EditRequest, RepositoryError> {
        let row = sqlx::query_as::<_, EditRequestRow>(&format!(
            "UPDATE edit_requests \
             SET status = 'rejected', rejection_reason = $1, \
                 admin_notes = COALESCE($2, admin_notes), \
                 processed_by = $3, processed_at = now(), reviewed_at = now() \
             WHERE id = $4 \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(reason)
        .bind(notes)
        .bind(processed_by.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Count approved requests sharing an applicant email, excluding one
    /// request id.
    ///
    /// Drives the orphaned-account cleanup decision on delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_other_approved_for_email(
        &self,
        applicant_email: &Email,
        excluding: EditRequestId,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM edit_requests \
             WHERE applicant_email = $1 AND status = 'approved' AND id <> $2",
        )
        .bind(applicant_email.as_str())
        .bind(excluding.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Physically delete a request row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the request doesn't exist.
    pub async fn delete(&self, id: EditRequestId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM edit_requests WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
