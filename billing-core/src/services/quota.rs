//! Quota admission control.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::clients::BillingRepository;
use crate::models::{QuotaDecision, ServiceType};

use super::with_timeout;

/// Admission control against the subject's active quota window.
///
/// Admission never mutates `quota_used`; consumption is recorded separately
/// after a completed settlement so a settlement failure cannot double-charge
/// the quota.
pub struct QuotaGate {
    repository: Arc<dyn BillingRepository>,
    call_timeout: Duration,
}

impl QuotaGate {
    pub fn new(repository: Arc<dyn BillingRepository>, call_timeout: Duration) -> Self {
        Self {
            repository,
            call_timeout,
        }
    }

    /// Absence of a quota row means unlimited, not forbidden.
    #[instrument(skip(self), fields(user_id = %user_id, service_type = service_type.as_str()))]
    pub async fn admit(
        &self,
        user_id: Uuid,
        service_type: ServiceType,
        requested_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError> {
        let Some(quota) = with_timeout(
            "get_billing_quota",
            self.call_timeout,
            self.repository.get_billing_quota(user_id, service_type, now),
        )
        .await?
        else {
            debug!("No quota row for subject, admitting");
            return Ok(QuotaDecision::Admitted);
        };

        let remaining = quota.quota_remaining();
        if requested_amount <= remaining {
            Ok(QuotaDecision::Admitted)
        } else {
            warn!(
                quota_limit = %quota.quota_limit,
                quota_used = %quota.quota_used,
                quota_remaining = %remaining,
                requested_amount = %requested_amount,
                "Quota exceeded"
            );
            Ok(QuotaDecision::Exceeded {
                limit: quota.quota_limit,
                used: quota.quota_used,
                remaining,
            })
        }
    }

    /// Record consumption against the active quota row, if one exists. The
    /// underlying increment is a single atomic operation in the store.
    #[instrument(skip(self), fields(user_id = %user_id, service_type = service_type.as_str()))]
    pub async fn record_consumption(
        &self,
        user_id: Uuid,
        service_type: ServiceType,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let Some(quota) = with_timeout(
            "get_billing_quota",
            self.call_timeout,
            self.repository.get_billing_quota(user_id, service_type, now),
        )
        .await?
        else {
            return Ok(());
        };

        with_timeout(
            "increment_quota_used",
            self.call_timeout,
            self.repository.increment_quota_used(quota.quota_id, amount),
        )
        .await
    }
}
