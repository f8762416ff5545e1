//! Read-only usage rollups computed from billing records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-service-type slice of an aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUsage {
    pub usage: Decimal,
    pub cost: Decimal,
    pub record_count: i64,
}

/// Rollup of a user's billing records over a period. Derived on query and
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAggregation {
    pub user_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_usage: Decimal,
    pub total_cost: Decimal,
    pub usage_breakdown: HashMap<String, ServiceUsage>,
}
