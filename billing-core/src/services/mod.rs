//! Pipeline services for billing-core.

mod aggregation;
mod cost;
mod idempotency;
mod inclusion;
pub mod metrics;
mod pricing;
mod processor;
mod quota;
mod reconciliation;
mod settlement;

pub use aggregation::UsageAggregator;
pub use cost::{calculate_cost, CostBreakdown, CostClassification};
pub use idempotency::IdempotencyCache;
pub use inclusion::{InclusionChecker, InclusionResult};
pub use metrics::{
    get_metrics, init_metrics, record_event_published, record_publish_failure,
    record_quota_rejection, record_settled_amount, record_settlement, record_usage_event,
};
pub use pricing::{PricingResolver, ResolvedPricing};
pub use processor::{PipelineOutcome, UsageEventProcessor};
pub use quota::QuotaGate;
pub use reconciliation::ReconciliationSweep;
pub use settlement::{select_method, SettlementEngine, SettlementResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use service_core::error::AppError;
use tracing::warn;

use crate::clients::{BillingRepository, EventPublisher};
use crate::models::BillingEvent;

/// Wrap a single collaborator call in an explicit timeout. None of the
/// collaborators carry deadlines of their own, so a hung dependency would
/// otherwise stall a pipeline worker indefinitely.
pub(crate) async fn with_timeout<T>(
    operation: &str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::BadGateway(format!(
            "{} timed out after {}s",
            operation,
            timeout.as_secs()
        ))),
    }
}

/// Persist and publish an audit event, best-effort on both channels. A
/// failure is logged and counted; it never propagates into the pipeline
/// that raised the event.
pub(crate) async fn emit_event(
    repository: &Arc<dyn BillingRepository>,
    publisher: &Arc<dyn EventPublisher>,
    call_timeout: Duration,
    event: BillingEvent,
) {
    let kind = event.kind.as_str();

    if let Err(e) = with_timeout(
        "create_billing_event",
        call_timeout,
        repository.create_billing_event(&event),
    )
    .await
    {
        warn!(kind = kind, error = %e, "Failed to persist audit event");
        record_publish_failure("repository");
    }

    match with_timeout("publish_event", call_timeout, publisher.publish(&event)).await {
        Ok(()) => record_event_published(kind),
        Err(e) => {
            warn!(kind = kind, error = %e, "Failed to publish event to bus");
            record_publish_failure("bus");
        }
    }
}
