//! Broadcast quota models.

use serde::Serialize;

/// Result of a quota check for one store in the current week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    /// Whether broadcasts are available at all on this plan tier.
    pub feature_enabled: bool,
    pub limit: i32,
    pub used: i32,
    pub remaining: i32,
    pub can_broadcast: bool,
}
