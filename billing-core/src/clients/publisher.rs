//! Outbound event bus contract.

use async_trait::async_trait;
use service_core::error::AppError;

use crate::models::BillingEvent;

/// Publishes billing events to the message bus. Callers treat publication
/// as fire-and-forget: a publish failure is logged and counted, never
/// propagated into the state-mutating pipeline.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &BillingEvent) -> Result<(), AppError>;
}
