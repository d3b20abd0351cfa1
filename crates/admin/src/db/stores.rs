//! Store repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use machiya_core::StoreId;

use super::RepositoryError;
use crate::models::Store;

/// Internal row type for store queries.
#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: i32,
    name: String,
    address: String,
    phone: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    plan_tier: Option<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: StoreId::new(row.id),
            name: row.name,
            address: row.address,
            phone: row.phone,
            latitude: row.latitude,
            longitude: row.longitude,
            plan_tier: row.plan_tier,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Slim projection used by fuzzy store matching.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreSummaryRow {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

const SELECT_COLUMNS: &str = "id, name, address, phone, latitude, longitude, plan_tier, \
     is_active, created_at, updated_at";

/// New store fields for creation at approval time.
#[derive(Debug, Clone)]
pub struct NewStore<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub phone: Option<&'a str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Validated self-service update fields for a store.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreUpdate {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a store by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM stores WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a new store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, store: &NewStore<'_>) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO stores (name, address, phone, latitude, longitude) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(store.name)
        .bind(store.address)
        .bind(store.phone)
        .bind(store.latitude)
        .bind(store.longitude)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Re-create a store under a fixed id.
    ///
    /// Self-heal path for approved requests whose referenced store row has
    /// gone missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id is already taken.
    pub async fn create_with_id(
        &self,
        id: StoreId,
        store: &NewStore<'_>,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO stores (id, name, address, phone, latitude, longitude) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(store.name)
        .bind(store.address)
        .bind(store.phone)
        .bind(store.latitude)
        .bind(store.longitude)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "store id already exists"))?;

        // Keep the sequence ahead of explicitly inserted ids.
        sqlx::query("SELECT setval('stores_id_seq', (SELECT MAX(id) FROM stores))")
            .execute(self.pool)
            .await?;

        Ok(row.into())
    }

    /// List all stores as slim summaries for fuzzy matching.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_summaries(&self) -> Result<Vec<StoreSummaryRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreSummaryRow>(
            "SELECT id, name, address, phone FROM stores ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Apply a self-service update to a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    pub async fn update(&self, id: StoreId, update: &StoreUpdate) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "UPDATE stores \
             SET name = $1, address = $2, phone = $3, updated_at = now() \
             WHERE id = $4 \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.phone)
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Resolve the plan tier for a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    pub async fn plan_tier(&self, id: StoreId) -> Result<Option<i32>, RepositoryError> {
        let tier = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT plan_tier FROM stores WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(tier)
    }
}
