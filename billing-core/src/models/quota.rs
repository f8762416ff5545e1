//! Per-subject usage quota model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ServiceType;

/// A period-bound usage ceiling for a subject and service type.
///
/// `quota_remaining = quota_limit - quota_used` must hold after every
/// update; the repository's increment operation is atomic so concurrent
/// admissions cannot lose updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingQuota {
    pub quota_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub service_type: ServiceType,
    pub quota_limit: Decimal,
    pub quota_used: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl BillingQuota {
    pub fn quota_remaining(&self) -> Decimal {
        self.quota_limit - self.quota_used
    }

    /// A quota row is only consulted while "now" falls inside its window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.period_start <= now && now < self.period_end
    }
}

/// Outcome of a quota admission check. Rejection is an outcome, not an
/// error; it carries the figures for caller diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Admitted,
    Exceeded {
        limit: Decimal,
        used: Decimal,
        remaining: Decimal,
    },
}

impl QuotaDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, QuotaDecision::Admitted)
    }
}
