//! Idempotent usage event ingestion and the billing pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::clients::{
    BalanceProvider, BillingRepository, EventPublisher, PricingProvider, SettlementExecutor,
    SubscriptionProvider,
};
use crate::config::ProcessorConfig;
use crate::models::{
    BillingEvent, BillingEventKind, BillingMethod, BillingRecord, BillingStatus, QuotaDecision,
    UsageEvent,
};

use super::metrics::{record_quota_rejection, record_usage_event, PIPELINE_DURATION};
use super::{
    calculate_cost, emit_event, select_method, with_timeout, CostBreakdown, CostClassification,
    IdempotencyCache, InclusionChecker, InclusionResult, PricingResolver, QuotaGate,
    ResolvedPricing, SettlementEngine, SettlementResult,
};

/// Terminal outcome of one usage event's pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The event id was already processed; the delivery had no effect.
    Duplicate,
    /// Zero or negative usage; nothing to bill.
    Dropped,
    /// No price could be resolved; reported via `billing.error`, no record.
    PricingUnavailable { message: String },
    /// Rejected by quota admission; no record was created.
    QuotaExceeded {
        limit: Decimal,
        used: Decimal,
        remaining: Decimal,
    },
    /// Admitted and settled.
    Settled(BillingRecord),
    /// Admitted; settlement deferred to the payment collaborator.
    Deferred(BillingRecord),
    /// Admitted but the settlement strategy failed.
    Failed(BillingRecord),
}

impl PipelineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Duplicate => "duplicate",
            PipelineOutcome::Dropped => "dropped",
            PipelineOutcome::PricingUnavailable { .. } => "pricing_unavailable",
            PipelineOutcome::QuotaExceeded { .. } => "quota_exceeded",
            PipelineOutcome::Settled(_) => "settled",
            PipelineOutcome::Deferred(_) => "deferred",
            PipelineOutcome::Failed(_) => "failed",
        }
    }
}

/// Drives each usage event through pricing, inclusion, cost, quota and
/// settlement exactly once per logical event.
///
/// Concurrency model: no global lock; events for distinct
/// `usage_record_id`s run fully in parallel. The idempotency cache is a
/// fast path only: two concurrent deliveries of the same id can both pass
/// it, and the repository's uniqueness constraint resolves the race (the
/// loser observes `Conflict` and drops out as a duplicate).
pub struct UsageEventProcessor {
    resolver: PricingResolver,
    inclusion: InclusionChecker,
    quota: QuotaGate,
    engine: SettlementEngine,
    repository: Arc<dyn BillingRepository>,
    balances: Arc<dyn BalanceProvider>,
    publisher: Arc<dyn EventPublisher>,
    cache: IdempotencyCache,
    call_timeout: Duration,
}

impl UsageEventProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &ProcessorConfig,
        repository: Arc<dyn BillingRepository>,
        pricing: Arc<dyn PricingProvider>,
        subscriptions: Arc<dyn SubscriptionProvider>,
        balances: Arc<dyn BalanceProvider>,
        settlement: Arc<dyn SettlementExecutor>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let call_timeout = config.call_timeout();
        Self {
            resolver: PricingResolver::new(pricing, call_timeout),
            inclusion: InclusionChecker::new(subscriptions, call_timeout),
            quota: QuotaGate::new(repository.clone(), call_timeout),
            engine: SettlementEngine::new(repository.clone(), settlement, call_timeout),
            repository,
            balances,
            publisher,
            cache: IdempotencyCache::new(config.idempotency_capacity),
            call_timeout,
        }
    }

    /// Run one usage event to a terminal outcome.
    ///
    /// The event id is marked processed only after the pipeline completes,
    /// so a crash mid-pipeline results in at-least-once redelivery rather
    /// than silent loss. Transient collaborator errors propagate without
    /// marking the id, for the same reason.
    #[instrument(
        skip(self, event),
        fields(event_id = %event.event_id, user_id = %event.user_id, product_id = %event.product_id)
    )]
    pub async fn handle_event(&self, event: UsageEvent) -> Result<PipelineOutcome, AppError> {
        let start = Instant::now();

        if self.cache.contains(&event.event_id) {
            debug!("Duplicate usage event dropped");
            return Ok(finish(start, PipelineOutcome::Duplicate));
        }

        if event.usage_amount <= Decimal::ZERO {
            debug!(usage_amount = %event.usage_amount, "Nothing to bill, event dropped");
            return Ok(finish(start, PipelineOutcome::Dropped));
        }

        let pricing = match self
            .resolver
            .resolve(event.product_id, event.user_id, event.subscription_id)
            .await
        {
            Ok(pricing) => pricing,
            Err(AppError::PricingUnavailable(e)) => {
                let message = e.to_string();
                error!(error = %message, "Pricing could not be resolved");
                self.emit(BillingEvent::new(
                    BillingEventKind::Error,
                    None,
                    event.user_id,
                    json!({
                        "error_code": "PRICING_UNAVAILABLE",
                        "message": message,
                        "usage_event_id": event.event_id,
                        "product_id": event.product_id,
                    }),
                ))
                .await;
                self.cache.mark_processed(&event.event_id);
                return Ok(finish(start, PipelineOutcome::PricingUnavailable { message }));
            }
            Err(e) => return Err(e),
        };

        let inclusion = self
            .inclusion
            .check(event.subscription_id, event.product_id, event.usage_amount)
            .await?;
        let breakdown = calculate_cost(event.usage_amount, &pricing, inclusion.included);

        match self
            .quota
            .admit(
                event.user_id,
                event.service_type,
                event.usage_amount,
                Utc::now(),
            )
            .await?
        {
            QuotaDecision::Admitted => {}
            QuotaDecision::Exceeded {
                limit,
                used,
                remaining,
            } => {
                record_quota_rejection(event.service_type.as_str());
                self.emit(BillingEvent::new(
                    BillingEventKind::QuotaExceeded,
                    None,
                    event.user_id,
                    json!({
                        "usage_event_id": event.event_id,
                        "service_type": event.service_type.as_str(),
                        "requested_amount": event.usage_amount,
                        "quota_limit": limit,
                        "quota_used": used,
                        "quota_remaining": remaining,
                    }),
                ))
                .await;
                self.cache.mark_processed(&event.event_id);
                return Ok(finish(
                    start,
                    PipelineOutcome::QuotaExceeded {
                        limit,
                        used,
                        remaining,
                    },
                ));
            }
        }

        let method = if breakdown.classification == CostClassification::Billable {
            let wallet = with_timeout(
                "get_wallet_balance",
                self.call_timeout,
                self.balances.get_wallet_balance(event.user_id),
            )
            .await?;
            let credit = with_timeout(
                "get_credit_balance",
                self.call_timeout,
                self.balances.get_credit_balance(event.user_id),
            )
            .await?;
            select_method(&breakdown, wallet, credit)
        } else {
            BillingMethod::SubscriptionIncluded
        };

        let record = build_record(&event, &pricing, &breakdown, &inclusion, method);

        match with_timeout(
            "create_billing_record",
            self.call_timeout,
            self.repository.create_billing_record(&record),
        )
        .await
        {
            Ok(()) => {}
            Err(AppError::Conflict(e)) => {
                debug!(error = %e, "Billing record already exists for usage event");
                self.cache.mark_processed(&event.event_id);
                return Ok(finish(start, PipelineOutcome::Duplicate));
            }
            Err(e) => return Err(e),
        }

        self.emit(BillingEvent::new(
            BillingEventKind::RecordCreated,
            Some(record.billing_id),
            event.user_id,
            json!({
                "billing_id": record.billing_id,
                "usage_event_id": event.event_id,
                "billing_status": record.billing_status.as_str(),
            }),
        ))
        .await;

        self.emit(BillingEvent::new(
            BillingEventKind::Calculated,
            Some(record.billing_id),
            event.user_id,
            json!({
                "billing_id": record.billing_id,
                "usage_event_id": event.event_id,
                "product_id": event.product_id,
                "actual_usage": event.usage_amount,
                "cost": breakdown.total_cost,
                "unit_price": pricing.unit_price,
                "currency": pricing.currency.as_str(),
                "is_free_tier": breakdown.classification == CostClassification::Free,
                "is_included_in_subscription":
                    breakdown.classification == CostClassification::Included,
                "billing_method": method.as_str(),
            }),
        ))
        .await;

        let outcome = match self.engine.settle(record).await? {
            SettlementResult::Completed(record) => {
                if let Err(e) = self
                    .quota
                    .record_consumption(
                        event.user_id,
                        event.service_type,
                        event.usage_amount,
                        Utc::now(),
                    )
                    .await
                {
                    warn!(error = %e, "Failed to record quota consumption after settlement");
                }
                self.emit(BillingEvent::new(
                    BillingEventKind::Processed,
                    Some(record.billing_id),
                    event.user_id,
                    json!({
                        "billing_id": record.billing_id,
                        "usage_event_id": event.event_id,
                        "billing_method": record.billing_method.as_str(),
                        "total_amount": record.total_amount,
                        "wallet_transaction_id": record.wallet_transaction_id,
                        "payment_transaction_id": record.payment_transaction_id,
                    }),
                ))
                .await;
                PipelineOutcome::Settled(record)
            }
            SettlementResult::Deferred(record) => PipelineOutcome::Deferred(record),
            SettlementResult::Failed(record) => {
                self.emit(BillingEvent::new(
                    BillingEventKind::Failed,
                    Some(record.billing_id),
                    event.user_id,
                    json!({
                        "billing_id": record.billing_id,
                        "usage_event_id": event.event_id,
                        "billing_method": record.billing_method.as_str(),
                        "failure_reason": record.failure_reason,
                    }),
                ))
                .await;
                PipelineOutcome::Failed(record)
            }
        };

        self.cache.mark_processed(&event.event_id);
        Ok(finish(start, outcome))
    }

    async fn emit(&self, event: BillingEvent) {
        emit_event(&self.repository, &self.publisher, self.call_timeout, event).await;
    }
}

fn finish(start: Instant, outcome: PipelineOutcome) -> PipelineOutcome {
    record_usage_event(outcome.as_str());
    PIPELINE_DURATION
        .with_label_values(&[outcome.as_str()])
        .observe(start.elapsed().as_secs_f64());
    outcome
}

fn build_record(
    event: &UsageEvent,
    pricing: &ResolvedPricing,
    breakdown: &CostBreakdown,
    inclusion: &InclusionResult,
    method: BillingMethod,
) -> BillingRecord {
    let now = Utc::now();
    let mut metadata = json!({
        "classification": breakdown.classification.as_str(),
        "is_free_tier": breakdown.classification == CostClassification::Free,
        "is_included_in_subscription": inclusion.included,
        "unit_type": event.unit_type,
    });
    if let Some(remaining) = breakdown.free_tier_remaining {
        metadata["free_tier_remaining"] = json!(remaining);
    }
    if let Some(details) = &event.usage_details {
        metadata["usage_details"] = details.clone();
    }
    if method == BillingMethod::PaymentCharge {
        metadata["payment_deferred"] = json!(true);
    }

    BillingRecord {
        billing_id: Uuid::new_v4(),
        user_id: event.user_id,
        organization_id: event.organization_id,
        subscription_id: event.subscription_id,
        usage_record_id: event.event_id.clone(),
        product_id: event.product_id,
        service_type: event.service_type,
        usage_amount: event.usage_amount,
        unit_price: pricing.unit_price,
        total_amount: breakdown.total_cost,
        currency: pricing.currency,
        billing_method: method,
        billing_status: BillingStatus::Pending,
        wallet_transaction_id: None,
        payment_transaction_id: None,
        failure_reason: None,
        metadata: Some(metadata),
        created_utc: now,
        updated_utc: now,
    }
}
