//! Inbound usage events and the billing audit-event trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ServiceType;

/// A usage event consumed from the message bus.
///
/// `event_id` is the external identifier used for idempotent ingestion; it
/// becomes the `usage_record_id` of the billing record it produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub event_id: String,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub product_id: Uuid,
    pub service_type: ServiceType,
    pub usage_amount: Decimal,
    pub unit_type: String,
    pub usage_details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Kind of audit event raised by the pipeline. `as_str` yields the wire
/// topic the event is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingEventKind {
    RecordCreated,
    Calculated,
    Processed,
    Failed,
    QuotaExceeded,
    Error,
}

impl BillingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingEventKind::RecordCreated => "billing.record.created",
            BillingEventKind::Calculated => "billing.calculated",
            BillingEventKind::Processed => "billing.processed",
            BillingEventKind::Failed => "billing.failed",
            BillingEventKind::QuotaExceeded => "quota.exceeded",
            BillingEventKind::Error => "billing.error",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "billing.record.created" => BillingEventKind::RecordCreated,
            "billing.calculated" => BillingEventKind::Calculated,
            "billing.processed" => BillingEventKind::Processed,
            "billing.failed" => BillingEventKind::Failed,
            "quota.exceeded" => BillingEventKind::QuotaExceeded,
            _ => BillingEventKind::Error,
        }
    }
}

/// One audit trail entry, immutable once created. Stored through the
/// repository and mirrored onto the bus; both writes are best-effort and
/// never roll back the billing decision they describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEvent {
    pub event_id: Uuid,
    pub kind: BillingEventKind,
    pub billing_record_id: Option<Uuid>,
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

impl BillingEvent {
    pub fn new(
        kind: BillingEventKind,
        billing_record_id: Option<Uuid>,
        user_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            billing_record_id,
            user_id,
            payload,
            created_utc: Utc::now(),
        }
    }
}
