//! Subscription inclusion check.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::clients::SubscriptionProvider;

use super::with_timeout;

/// Whether a usage amount is covered by the subscription's bundled
/// allowance for the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionResult {
    pub included: bool,
}

impl InclusionResult {
    pub fn not_included() -> Self {
        Self { included: false }
    }

    pub fn included() -> Self {
        Self { included: true }
    }
}

/// Checks whether usage is already covered by the user's active
/// subscription terms.
pub struct InclusionChecker {
    provider: Arc<dyn SubscriptionProvider>,
    call_timeout: Duration,
}

impl InclusionChecker {
    pub fn new(provider: Arc<dyn SubscriptionProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// The first inclusion entry for the product is authoritative, even if
    /// the list carries duplicates; usage is covered only when that entry's
    /// `included_amount` is at least the requested amount.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn check(
        &self,
        subscription_id: Option<Uuid>,
        product_id: Uuid,
        usage_amount: Decimal,
    ) -> Result<InclusionResult, AppError> {
        let Some(subscription_id) = subscription_id else {
            return Ok(InclusionResult::not_included());
        };

        let Some(info) = with_timeout(
            "get_subscription_info",
            self.call_timeout,
            self.provider.get_subscription_info(subscription_id),
        )
        .await?
        else {
            debug!(subscription_id = %subscription_id, "No subscription terms found");
            return Ok(InclusionResult::not_included());
        };

        let covered = info
            .included_products
            .iter()
            .find(|p| p.product_id == product_id)
            .is_some_and(|p| p.included_amount >= usage_amount);

        if covered {
            debug!(subscription_id = %subscription_id, "Usage covered by subscription");
        }

        Ok(if covered {
            InclusionResult::included()
        } else {
            InclusionResult::not_included()
        })
    }
}
