//! Weekly broadcast limit repository.

use chrono::NaiveDate;
use sqlx::PgPool;

use machiya_core::StoreId;

use super::RepositoryError;

/// Repository for weekly broadcast counters.
pub struct BroadcastLimitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BroadcastLimitRepository<'a> {
    /// Create a new broadcast limit repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Lazily prune rows from weeks before `week_start`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn prune_before(
        &self,
        store_id: StoreId,
        week_start: NaiveDate,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM weekly_broadcast_limits WHERE store_id = $1 AND week_start_date < $2",
        )
        .bind(store_id.as_i32())
        .bind(week_start)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert a zero row for the week if none exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn ensure_row(
        &self,
        store_id: StoreId,
        week_start: NaiveDate,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO weekly_broadcast_limits (store_id, week_start_date, broadcast_count) \
             VALUES ($1, $2, 0) \
             ON CONFLICT (store_id, week_start_date) DO NOTHING",
        )
        .bind(store_id.as_i32())
        .bind(week_start)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get the used count for a store's week, if a row exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn used_count(
        &self,
        store_id: StoreId,
        week_start: NaiveDate,
    ) -> Result<Option<i32>, RepositoryError> {
        let count = sqlx::query_scalar::<_, i32>(
            "SELECT broadcast_count FROM weekly_broadcast_limits \
             WHERE store_id = $1 AND week_start_date = $2",
        )
        .bind(store_id.as_i32())
        .bind(week_start)
        .fetch_optional(self.pool)
        .await?;

        Ok(count)
    }

    /// Atomically increment the counter for a store's week, creating the row
    /// if necessary. Returns the new count.
    ///
    /// A single upsert closes the read-modify-write race between concurrent
    /// sends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn increment(
        &self,
        store_id: StoreId,
        week_start: NaiveDate,
    ) -> Result<i32, RepositoryError> {
        let count = sqlx::query_scalar::<_, i32>(
            "INSERT INTO weekly_broadcast_limits (store_id, week_start_date, broadcast_count) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (store_id, week_start_date) \
             DO UPDATE SET broadcast_count = weekly_broadcast_limits.broadcast_count + 1 \
             RETURNING broadcast_count",
        )
        .bind(store_id.as_i32())
        .bind(week_start)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
