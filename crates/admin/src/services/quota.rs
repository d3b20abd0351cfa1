//! Weekly broadcast quota engine.
//!
//! Quotas reset on Monday. Counters are stored per (store, week) and old
//! weeks are pruned lazily when a store owner logs in, so there is no
//! scheduled reset job. The arithmetic lives in pure functions so the
//! calendar rules can be tested without a database.

use chrono::{Datelike, Duration, NaiveDate};
use sqlx::PgPool;
use thiserror::Error;

use machiya_core::StoreId;

use crate::db::{BroadcastLimitRepository, RepositoryError, StoreRepository};
use crate::models::QuotaStatus;

/// Errors from quota operations.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The store's plan does not include broadcasts.
    #[error("broadcasts are not available on this plan")]
    FeatureDisabled,
    /// The weekly quota is exhausted.
    #[error("weekly broadcast quota exhausted")]
    QuotaExhausted,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The Monday on or before the given date.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_from_monday = i64::from(date.weekday().num_days_from_monday());
    date - Duration::days(days_from_monday)
}

/// Weekly broadcast allowance for a plan tier.
///
/// Tiers 1-3 get 3 sends, tiers 4-5 get 5. Absent or unrecognized tiers
/// get nothing, so a misconfigured store fails closed.
#[must_use]
pub const fn plan_limit(plan_tier: Option<i32>) -> i32 {
    match plan_tier {
        Some(1..=3) => 3,
        Some(4..=5) => 5,
        _ => 0,
    }
}

/// Compute the quota status for a plan tier and a used count.
#[must_use]
pub fn quota_status(plan_tier: Option<i32>, used: i32) -> QuotaStatus {
    let limit = plan_limit(plan_tier);
    let remaining = (limit - used).max(0);
    QuotaStatus {
        feature_enabled: limit > 0,
        limit,
        used,
        remaining,
        can_broadcast: limit > 0 && remaining > 0,
    }
}

/// Quota checks and counter maintenance over the repositories.
pub struct QuotaEngine<'a> {
    pool: &'a PgPool,
}

impl<'a> QuotaEngine<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Prepare the store's counter for the current week: prune stale weeks
    /// and make sure a zero row exists. Called at store-owner login.
    ///
    /// Stores whose plan disables broadcasts are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Repository` on database failure, including
    /// `RepositoryError::NotFound` for an unknown store.
    pub async fn initialize_week(
        &self,
        store_id: StoreId,
        today: NaiveDate,
    ) -> Result<(), QuotaError> {
        let plan_tier = StoreRepository::new(self.pool).plan_tier(store_id).await?;
        if plan_limit(plan_tier) == 0 {
            return Ok(());
        }

        let week = week_start(today);
        let limits = BroadcastLimitRepository::new(self.pool);
        let pruned = limits.prune_before(store_id, week).await?;
        if pruned > 0 {
            tracing::debug!(store_id = %store_id, pruned, "pruned stale broadcast weeks");
        }
        limits.ensure_row(store_id, week).await?;

        Ok(())
    }

    /// Current-week quota status for a store. Read-only; a missing counter
    /// row reads as zero used.
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Repository` on database failure, including
    /// `RepositoryError::NotFound` for an unknown store.
    pub async fn status(
        &self,
        store_id: StoreId,
        today: NaiveDate,
    ) -> Result<QuotaStatus, QuotaError> {
        let plan_tier = StoreRepository::new(self.pool).plan_tier(store_id).await?;
        if plan_limit(plan_tier) == 0 {
            return Ok(quota_status(plan_tier, 0));
        }

        let used = BroadcastLimitRepository::new(self.pool)
            .used_count(store_id, week_start(today))
            .await?
            .unwrap_or(0);

        Ok(quota_status(plan_tier, used))
    }

    /// Consume one send from the store's weekly quota.
    ///
    /// The check and the increment are separate statements; the increment
    /// itself is an atomic upsert, so concurrent sends cannot lose counts,
    /// though a pair racing the check may briefly land at limit + 1.
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::FeatureDisabled` when the plan has no broadcast
    /// allowance, `QuotaError::QuotaExhausted` when the week's allowance is
    /// spent, and `QuotaError::Repository` on database failure.
    pub async fn record_send(
        &self,
        store_id: StoreId,
        today: NaiveDate,
    ) -> Result<QuotaStatus, QuotaError> {
        let plan_tier = StoreRepository::new(self.pool).plan_tier(store_id).await?;
        let limit = plan_limit(plan_tier);
        if limit == 0 {
            return Err(QuotaError::FeatureDisabled);
        }

        let week = week_start(today);
        let limits = BroadcastLimitRepository::new(self.pool);
        let used = limits.used_count(store_id, week).await?.unwrap_or(0);
        if used >= limit {
            return Err(QuotaError::QuotaExhausted);
        }

        let used = limits.increment(store_id, week).await?;
        Ok(quota_status(plan_tier, used))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_start_is_identity_on_monday() {
        // 2026-08-17 is a Monday.
        assert_eq!(week_start(date(2026, 8, 17)), date(2026, 8, 17));
    }

    #[test]
    fn test_week_start_rolls_back_midweek() {
        // Thursday rolls back three days.
        assert_eq!(week_start(date(2026, 8, 20)), date(2026, 8, 17));
    }

    #[test]
    fn test_week_start_sunday_rolls_back_six_days() {
        assert_eq!(week_start(date(2026, 8, 23)), date(2026, 8, 17));
    }

    #[test]
    fn test_week_start_crosses_month_boundary() {
        // 2026-09-01 is a Tuesday; its week began in August.
        assert_eq!(week_start(date(2026, 9, 1)), date(2026, 8, 31));
    }

    #[test]
    fn test_plan_limits_by_tier() {
        assert_eq!(plan_limit(None), 0);
        assert_eq!(plan_limit(Some(0)), 0);
        assert_eq!(plan_limit(Some(1)), 3);
        assert_eq!(plan_limit(Some(3)), 3);
        assert_eq!(plan_limit(Some(4)), 5);
        assert_eq!(plan_limit(Some(5)), 5);
        assert_eq!(plan_limit(Some(6)), 0);
        assert_eq!(plan_limit(Some(-1)), 0);
    }

    #[test]
    fn test_status_with_quota_remaining() {
        let status = quota_status(Some(2), 1);
        assert_eq!(
            status,
            QuotaStatus {
                feature_enabled: true,
                limit: 3,
                used: 1,
                remaining: 2,
                can_broadcast: true,
            }
        );
    }

    #[test]
    fn test_status_at_limit_cannot_broadcast() {
        let status = quota_status(Some(4), 5);
        assert!(!status.can_broadcast);
        assert_eq!(status.remaining, 0);
    }

    #[test]
    fn test_status_over_limit_clamps_remaining_to_zero() {
        // Racing sends can overshoot; remaining must never go negative.
        let status = quota_status(Some(1), 4);
        assert_eq!(status.remaining, 0);
        assert!(!status.can_broadcast);
    }

    #[test]
    fn test_status_disabled_tier() {
        let status = quota_status(None, 0);
        assert!(!status.feature_enabled);
        assert!(!status.can_broadcast);
        assert_eq!(status.limit, 0);
    }
}
