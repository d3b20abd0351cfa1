//! Store-listing edit request model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use machiya_core::{AdminUserId, DocumentStatus, EditRequestId, Email, RequestStatus, StoreId};

/// An applicant's request for store-listing edit rights.
///
/// `status` owns the review lifecycle; `document_verification_status` moves
/// independently via the verify-documents action.
#[derive(Debug, Clone, Serialize)]
pub struct EditRequest {
    pub id: EditRequestId,
    pub store_name: String,
    pub store_address: String,
    pub store_phone: Option<String>,
    pub applicant_name: String,
    pub applicant_email: Email,
    pub applicant_phone: Option<String>,
    pub genre_id: Option<i32>,
    pub store_id: Option<StoreId>,
    pub status: RequestStatus,
    pub document_verification_status: DocumentStatus,
    pub rejection_reason: Option<String>,
    pub admin_notes: Option<String>,
    /// Generated password (or a placeholder note when an existing account
    /// was reused), kept for operator visibility.
    pub generated_password: Option<String>,
    pub processed_by: Option<AdminUserId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
