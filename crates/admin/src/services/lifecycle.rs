//! Request lifecycle manager.
//!
//! Owns the review pipeline for store-listing edit requests:
//!
//! ```text
//! pending -> verified -> approved
//!        \____________-> rejected -> (deleted)
//! ```
//!
//! Approval is the heavy operation: it resolves (or re-creates) the store
//! row, provisions or reuses a store-owner account, and records the
//! credentials shown to operators. Geocoding and email are best-effort
//! throughout; a third-party outage never blocks a review decision.

use sqlx::PgPool;
use thiserror::Error;

use machiya_core::{AdminRole, DocumentStatus, EditRequestId, RequestStatus, StoreId};

use crate::db::{
    AdminUserRepository, AuditLogRepository, EditAccessRepository, EditRequestRepository,
    RepositoryError, StoreRepository,
    edit_requests::NewEditRequest,
    stores::NewStore,
};
use crate::models::{CurrentAdmin, EditRequest, Store};
use crate::services::email::EmailService;
use crate::services::geocode::Geocoder;
use crate::services::matching::{self, MatchCandidate, MatchQuery, StoreMatch};
use crate::services::password::{PasswordError, generate_password, hash_password};

/// Operator-visible note stored instead of a password when approval reuses
/// an account that already exists.
pub const EXISTING_ACCOUNT_NOTE: &str = "existing account (password unchanged)";

/// Default rejection reason recorded by cancel-approval.
const CANCELLED_REASON: &str = "approval cancelled";

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No request with that ID exists.
    #[error("request not found")]
    NotFound,

    /// The request's current status does not permit the operation.
    #[error("request is {status}, operation not permitted")]
    InvalidStatus { status: RequestStatus },

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// How approval will obtain the store row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreResolution {
    /// The referenced store exists; link to it.
    Reuse(StoreId),
    /// The request references a store whose row has gone missing;
    /// re-create it under the same ID so older links keep working.
    Recreate(StoreId),
    /// No store referenced; create a fresh one.
    CreateNew,
}

/// Decide the store resolution path from the request's reference and
/// whether that row still exists.
#[must_use]
pub const fn plan_store_resolution(
    referenced: Option<StoreId>,
    referenced_exists: bool,
) -> StoreResolution {
    match referenced {
        Some(id) if referenced_exists => StoreResolution::Reuse(id),
        Some(id) => StoreResolution::Recreate(id),
        None => StoreResolution::CreateNew,
    }
}

/// Decide whether deleting a rejected request should also delete the
/// applicant's account. Only a store-owner account with no other approved
/// request behind it is an orphan; real admin accounts are never touched.
#[must_use]
pub const fn plan_account_cleanup(other_approved: i64, account_role: Option<AdminRole>) -> bool {
    other_approved == 0 && matches!(account_role, Some(AdminRole::StoreOwner))
}

/// Outcome of an approval.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub request: EditRequest,
    pub store: Store,
    /// The generated password, or [`EXISTING_ACCOUNT_NOTE`].
    pub password_note: String,
    pub account_reused: bool,
}

/// Outcome of a cancel-approval, with revocation counts for the audit
/// trail.
#[derive(Debug)]
pub struct CancellationOutcome {
    pub request: EditRequest,
    pub tokens_revoked: u64,
    pub sessions_revoked: u64,
}

/// Public submission fields for a new request.
#[derive(Debug)]
pub struct RequestSubmission<'a> {
    pub store_name: &'a str,
    pub store_address: &'a str,
    pub store_phone: Option<&'a str>,
    pub applicant_name: &'a str,
    pub applicant_email: &'a machiya_core::Email,
    pub applicant_phone: Option<&'a str>,
    pub genre_id: Option<i32>,
    pub store_id: Option<StoreId>,
}

/// Review pipeline operations over the repositories.
pub struct RequestLifecycleService<'a> {
    pool: &'a PgPool,
    email: &'a EmailService,
    geocoder: &'a Geocoder,
}

impl<'a> RequestLifecycleService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, geocoder: &'a Geocoder) -> Self {
        Self {
            pool,
            email,
            geocoder,
        }
    }

    /// Record a public submission and notify both sides.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Repository` if the insert fails. Email
    /// delivery failures are logged, not surfaced.
    pub async fn submit(
        &self,
        submission: &RequestSubmission<'_>,
    ) -> Result<EditRequest, LifecycleError> {
        let request = EditRequestRepository::new(self.pool)
            .create(&NewEditRequest {
                store_name: submission.store_name,
                store_address: submission.store_address,
                store_phone: submission.store_phone,
                applicant_name: submission.applicant_name,
                applicant_email: submission.applicant_email,
                applicant_phone: submission.applicant_phone,
                genre_id: submission.genre_id,
                store_id: submission.store_id,
            })
            .await?;

        if let Err(e) = self
            .email
            .send_request_receipt(&request.applicant_email, &request.store_name)
            .await
        {
            tracing::warn!(request_id = %request.id, error = %e, "failed to send receipt email");
        }
        if let Err(e) = self
            .email
            .send_review_alert(request.id.as_i32(), &request.store_name)
            .await
        {
            tracing::warn!(request_id = %request.id, error = %e, "failed to send review alert");
        }

        AuditLogRepository::new(self.pool)
            .record(
                "request.submitted",
                serde_json::json!({ "request_id": request.id }),
                None,
                None,
            )
            .await;

        Ok(request)
    }

    /// Fetch one request.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::NotFound` for an unknown ID.
    pub async fn get(&self, id: EditRequestId) -> Result<EditRequest, LifecycleError> {
        EditRequestRepository::new(self.pool)
            .get_by_id(id)
            .await?
            .ok_or(LifecycleError::NotFound)
    }

    /// List requests, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Repository` if the query fails.
    pub async fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<EditRequest>, LifecycleError> {
        Ok(EditRequestRepository::new(self.pool).list(status).await?)
    }

    /// Record a document verification verdict. Moves only the document
    /// status; the request status is untouched.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidStatus` once the request has been
    /// decided.
    pub async fn verify_documents(
        &self,
        id: EditRequestId,
        verdict: DocumentStatus,
        reviewer: &CurrentAdmin,
    ) -> Result<EditRequest, LifecycleError> {
        let request = self.get(id).await?;
        if !request.status.is_decidable() {
            return Err(LifecycleError::InvalidStatus {
                status: request.status,
            });
        }

        let request = EditRequestRepository::new(self.pool)
            .set_document_status(id, verdict, reviewer.id)
            .await?;

        AuditLogRepository::new(self.pool)
            .record(
                "request.documents_reviewed",
                serde_json::json!({ "request_id": id, "verdict": verdict }),
                None,
                None,
            )
            .await;

        Ok(request)
    }

    /// Approve a request: resolve the store, provision or reuse the owner
    /// account, and bind everything to the request row.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidStatus` unless the request is still
    /// pending or verified.
    pub async fn approve(
        &self,
        id: EditRequestId,
        approver: &CurrentAdmin,
    ) -> Result<ApprovalOutcome, LifecycleError> {
        let request = self.get(id).await?;
        if !request.status.is_decidable() {
            return Err(LifecycleError::InvalidStatus {
                status: request.status,
            });
        }

        let store = self.resolve_store(&request).await?;

        let users = AdminUserRepository::new(self.pool);
        let existing = users.get_by_login_id(&request.applicant_email).await?;

        let (password_note, account_reused) = match existing {
            Some(account) => {
                users.reassign_store(account.id, store.id).await?;
                (EXISTING_ACCOUNT_NOTE.to_owned(), true)
            }
            None => {
                let password = generate_password();
                users
                    .create(
                        &request.applicant_email,
                        &hash_password(&password)?,
                        &request.applicant_name,
                        AdminRole::StoreOwner,
                        Some(store.id),
                    )
                    .await?;

                if let Err(e) = self
                    .email
                    .send_approval_credentials(
                        &request.applicant_email,
                        &store.name,
                        request.applicant_email.as_str(),
                        &password,
                    )
                    .await
                {
                    tracing::warn!(
                        request_id = %id, error = %e,
                        "failed to send approval credentials email"
                    );
                }

                (password, false)
            }
        };

        let request = EditRequestRepository::new(self.pool)
            .mark_approved(id, store.id, &password_note, approver.id)
            .await?;

        AuditLogRepository::new(self.pool)
            .record(
                "request.approved",
                serde_json::json!({
                    "request_id": id,
                    "store_id": store.id,
                    "approved_by": approver.id,
                    "account_reused": account_reused,
                }),
                None,
                None,
            )
            .await;

        Ok(ApprovalOutcome {
            request,
            store,
            password_note,
            account_reused,
        })
    }

    /// Reject a request with a reason.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidStatus` unless the request is still
    /// pending or verified.
    pub async fn reject(
        &self,
        id: EditRequestId,
        reason: &str,
        notes: Option<&str>,
        reviewer: &CurrentAdmin,
    ) -> Result<EditRequest, LifecycleError> {
        let request = self.get(id).await?;
        if !request.status.is_decidable() {
            return Err(LifecycleError::InvalidStatus {
                status: request.status,
            });
        }

        let request = EditRequestRepository::new(self.pool)
            .mark_rejected(id, reason, notes, reviewer.id)
            .await?;

        AuditLogRepository::new(self.pool)
            .record(
                "request.rejected",
                serde_json::json!({ "request_id": id, "rejected_by": reviewer.id }),
                None,
                None,
            )
            .await;

        Ok(request)
    }

    /// Cancel an earlier approval: force the request to rejected and revoke
    /// every edit token and session issued under it.
    ///
    /// The status flip lands first. If a revocation step then fails, the
    /// error surfaces and a retry re-runs the revocations against the
    /// already-rejected request, so revocation is at-least-once.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidStatus` unless the request is
    /// approved (or already rejected, for retries).
    pub async fn cancel_approval(
        &self,
        id: EditRequestId,
        reason: Option<&str>,
        reviewer: &CurrentAdmin,
    ) -> Result<CancellationOutcome, LifecycleError> {
        let request = self.get(id).await?;
        if !request.status.is_cancellable() && !request.status.is_deletable() {
            return Err(LifecycleError::InvalidStatus {
                status: request.status,
            });
        }

        let request = EditRequestRepository::new(self.pool)
            .mark_rejected(id, reason.unwrap_or(CANCELLED_REASON), None, reviewer.id)
            .await?;

        let access = EditAccessRepository::new(self.pool);
        let tokens_revoked = access.deactivate_tokens_for_request(id).await?;
        let sessions_revoked = access.deactivate_sessions_for_request(id).await?;

        AuditLogRepository::new(self.pool)
            .record(
                "request.approval_cancelled",
                serde_json::json!({
                    "request_id": id,
                    "cancelled_by": reviewer.id,
                    "tokens_revoked": tokens_revoked,
                    "sessions_revoked": sessions_revoked,
                }),
                None,
                None,
            )
            .await;

        Ok(CancellationOutcome {
            request,
            tokens_revoked,
            sessions_revoked,
        })
    }

    /// Delete a rejected request, cleaning up the applicant's store-owner
    /// account when no other approved request still backs it.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidStatus` unless the request is
    /// rejected.
    pub async fn delete(
        &self,
        id: EditRequestId,
        reviewer: &CurrentAdmin,
    ) -> Result<(), LifecycleError> {
        let request = self.get(id).await?;
        if !request.status.is_deletable() {
            return Err(LifecycleError::InvalidStatus {
                status: request.status,
            });
        }

        let requests = EditRequestRepository::new(self.pool);
        let others = requests
            .count_other_approved_for_email(&request.applicant_email, id)
            .await?;

        let users = AdminUserRepository::new(self.pool);
        let account = users.get_by_login_id(&request.applicant_email).await?;

        let mut account_deleted = false;
        if plan_account_cleanup(others, account.as_ref().map(|a| a.role))
            && let Some(account) = account
        {
            users.delete(account.id).await?;
            account_deleted = true;
        }

        requests.delete(id).await?;

        AuditLogRepository::new(self.pool)
            .record(
                "request.deleted",
                serde_json::json!({
                    "request_id": id,
                    "deleted_by": reviewer.id,
                    "account_deleted": account_deleted,
                }),
                None,
                None,
            )
            .await;

        Ok(())
    }

    /// Fuzzy-match a request's store fields against existing stores.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::NotFound` for an unknown request.
    pub async fn store_matches(&self, id: EditRequestId) -> Result<Vec<StoreMatch>, LifecycleError> {
        let request = self.get(id).await?;
        let candidates = StoreRepository::new(self.pool)
            .list_summaries()
            .await?
            .into_iter()
            .map(|row| MatchCandidate {
                id: StoreId::new(row.id),
                name: row.name,
                address: row.address,
                phone: row.phone,
            })
            .collect();

        Ok(matching::top_matches(
            &MatchQuery {
                name: &request.store_name,
                address: &request.store_address,
                phone: request.store_phone.as_deref(),
            },
            candidates,
        ))
    }

    /// Resolve the store row an approval binds to, geocoding new rows
    /// best-effort.
    async fn resolve_store(&self, request: &EditRequest) -> Result<Store, LifecycleError> {
        let stores = StoreRepository::new(self.pool);

        let referenced_exists = match request.store_id {
            Some(id) => stores.get_by_id(id).await?.is_some(),
            None => false,
        };

        match plan_store_resolution(request.store_id, referenced_exists) {
            StoreResolution::Reuse(id) => stores
                .get_by_id(id)
                .await?
                .ok_or(RepositoryError::NotFound)
                .map_err(Into::into),
            StoreResolution::Recreate(id) => {
                tracing::warn!(
                    request_id = %request.id, store_id = %id,
                    "referenced store row missing, re-creating under the same id"
                );
                let (latitude, longitude) = self.geocode_best_effort(&request.store_address).await;
                Ok(stores
                    .create_with_id(
                        id,
                        &NewStore {
                            name: &request.store_name,
                            address: &request.store_address,
                            phone: request.store_phone.as_deref(),
                            latitude,
                            longitude,
                        },
                    )
                    .await?)
            }
            StoreResolution::CreateNew => {
                let (latitude, longitude) = self.geocode_best_effort(&request.store_address).await;
                Ok(stores
                    .create(&NewStore {
                        name: &request.store_name,
                        address: &request.store_address,
                        phone: request.store_phone.as_deref(),
                        latitude,
                        longitude,
                    })
                    .await?)
            }
        }
    }

    async fn geocode_best_effort(&self, address: &str) -> (Option<f64>, Option<f64>) {
        match self.geocoder.lookup(address).await {
            Ok(geocoded) => (Some(geocoded.latitude), Some(geocoded.longitude)),
            Err(e) => {
                tracing::warn!(error = %e, "geocoding failed, storing without coordinates");
                (None, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_resolution_reuses_existing_reference() {
        assert_eq!(
            plan_store_resolution(Some(StoreId::new(9)), true),
            StoreResolution::Reuse(StoreId::new(9))
        );
    }

    #[test]
    fn test_store_resolution_recreates_missing_reference() {
        assert_eq!(
            plan_store_resolution(Some(StoreId::new(9)), false),
            StoreResolution::Recreate(StoreId::new(9))
        );
    }

    #[test]
    fn test_store_resolution_creates_without_reference() {
        assert_eq!(plan_store_resolution(None, false), StoreResolution::CreateNew);
        // The exists flag is meaningless without a reference.
        assert_eq!(plan_store_resolution(None, true), StoreResolution::CreateNew);
    }

    #[test]
    fn test_delete_keeps_account_backed_by_another_approval() {
        // Applicant has one other approved request: the account survives.
        assert!(!plan_account_cleanup(1, Some(AdminRole::StoreOwner)));
        assert!(!plan_account_cleanup(3, Some(AdminRole::StoreOwner)));
    }

    #[test]
    fn test_delete_removes_orphaned_store_owner_account() {
        assert!(plan_account_cleanup(0, Some(AdminRole::StoreOwner)));
    }

    #[test]
    fn test_delete_never_touches_non_owner_accounts() {
        assert!(!plan_account_cleanup(0, Some(AdminRole::Admin)));
        assert!(!plan_account_cleanup(0, Some(AdminRole::SuperAdmin)));
        assert!(!plan_account_cleanup(0, Some(AdminRole::Moderator)));
        assert!(!plan_account_cleanup(0, None));
    }

    #[test]
    fn test_decision_gates_follow_status() {
        assert!(RequestStatus::Pending.is_decidable());
        assert!(RequestStatus::Verified.is_decidable());
        assert!(!RequestStatus::Approved.is_decidable());
        assert!(!RequestStatus::Rejected.is_decidable());

        assert!(RequestStatus::Approved.is_cancellable());
        assert!(!RequestStatus::Pending.is_cancellable());

        assert!(RequestStatus::Rejected.is_deletable());
        assert!(!RequestStatus::Approved.is_deletable());
    }
}
