//! Durable storage contract for billing records, audit events and quotas.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{BillingEvent, BillingQuota, BillingRecord, BillingStatus, ServiceType};

/// Storage collaborator. The backing store must enforce a uniqueness
/// constraint on `usage_record_id`; `create_billing_record` reports a
/// violation as [`AppError::Conflict`], which the ingestor treats as the
/// idempotency signal for a redelivered event.
#[async_trait]
pub trait BillingRepository: Send + Sync {
    /// Insert a new record. Errors with `Conflict` when a record with the
    /// same `usage_record_id` already exists.
    async fn create_billing_record(&self, record: &BillingRecord) -> Result<(), AppError>;

    /// Apply a status transition, attaching transaction identifiers on
    /// success and a failure reason on failure. Implementations must reject
    /// transitions that `BillingStatus::can_transition_to` forbids with
    /// `Conflict`. Returns the updated record, or `None` when the id is
    /// unknown.
    async fn update_billing_record_status(
        &self,
        billing_id: Uuid,
        status: BillingStatus,
        wallet_transaction_id: Option<String>,
        payment_transaction_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<Option<BillingRecord>, AppError>;

    async fn get_billing_record(&self, billing_id: Uuid) -> Result<Option<BillingRecord>, AppError>;

    async fn get_billing_record_by_usage_id(
        &self,
        usage_record_id: &str,
    ) -> Result<Option<BillingRecord>, AppError>;

    /// Append an audit event. Audit writes are best-effort from the caller's
    /// perspective; a failure here never rolls back a billing decision.
    async fn create_billing_event(&self, event: &BillingEvent) -> Result<(), AppError>;

    /// The single active quota row for a subject and service type, if any.
    /// At most one row may match a subject + service + window containing
    /// `now`; enforcing non-overlap is the store's write-time duty.
    async fn get_billing_quota(
        &self,
        user_id: Uuid,
        service_type: ServiceType,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingQuota>, AppError>;

    /// Atomically add `amount` to `quota_used`. Must be a single atomic
    /// increment in the store, not a read-modify-write.
    async fn increment_quota_used(&self, quota_id: Uuid, amount: Decimal) -> Result<(), AppError>;

    /// Records for a user whose `created_utc` falls within the period,
    /// ordered by creation time. Aggregation input.
    async fn list_billing_records(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<BillingRecord>, AppError>;

    /// Records stuck in `processing` since before `cutoff`. Reconciliation
    /// input.
    async fn list_stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BillingRecord>, AppError>;
}
