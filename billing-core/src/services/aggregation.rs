//! Usage rollups over billing records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use crate::clients::BillingRepository;
use crate::models::{BillingStatus, ServiceUsage, UsageAggregation};

use super::with_timeout;

/// Computes read-only usage aggregations on query. Failed records are
/// skipped: their usage never settled and a retry arrives as a new event.
pub struct UsageAggregator {
    repository: Arc<dyn BillingRepository>,
    call_timeout: Duration,
}

impl UsageAggregator {
    pub fn new(repository: Arc<dyn BillingRepository>, call_timeout: Duration) -> Self {
        Self {
            repository,
            call_timeout,
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn aggregate(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<UsageAggregation, AppError> {
        let records = with_timeout(
            "list_billing_records",
            self.call_timeout,
            self.repository
                .list_billing_records(user_id, period_start, period_end),
        )
        .await?;

        let mut total_usage = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;
        let mut usage_breakdown: HashMap<String, ServiceUsage> = HashMap::new();

        for record in records {
            if record.billing_status == BillingStatus::Failed {
                continue;
            }
            total_usage += record.usage_amount;
            total_cost += record.total_amount;

            let entry = usage_breakdown
                .entry(record.service_type.as_str().to_string())
                .or_default();
            entry.usage += record.usage_amount;
            entry.cost += record.total_amount;
            entry.record_count += 1;
        }

        Ok(UsageAggregation {
            user_id,
            period_start,
            period_end,
            total_usage,
            total_cost,
            usage_breakdown,
        })
    }
}
