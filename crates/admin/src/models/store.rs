//! Store model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use machiya_core::StoreId;

/// A store listing on the platform.
#[derive(Debug, Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    /// Null when geocoding failed or was never attempted.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Subscription plan tier; drives the weekly broadcast quota.
    pub plan_tier: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
