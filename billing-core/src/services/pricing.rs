//! Effective unit price resolution.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::clients::PricingProvider;
use crate::models::Currency;

use super::with_timeout;

/// Pricing figures after override resolution, ready for cost calculation.
#[derive(Debug, Clone)]
pub struct ResolvedPricing {
    pub unit_price: Decimal,
    /// Zero means the product has no free tier.
    pub free_tier_limit: Decimal,
    pub currency: Currency,
}

/// Resolves the effective unit price, currency and free-tier allowance for
/// a product in a user/subscription context.
pub struct PricingResolver {
    provider: Arc<dyn PricingProvider>,
    call_timeout: Duration,
}

impl PricingResolver {
    pub fn new(provider: Arc<dyn PricingProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// Price priority: explicit `unit_price`, else the `effective_price`
    /// override, else the base model price, else zero. A provider response
    /// of `None` is a hard stop; no cost can be computed without a price.
    #[instrument(skip(self), fields(product_id = %product_id, user_id = %user_id))]
    pub async fn resolve(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> Result<ResolvedPricing, AppError> {
        let pricing = with_timeout(
            "get_product_pricing",
            self.call_timeout,
            self.provider
                .get_product_pricing(product_id, user_id, subscription_id),
        )
        .await?
        .ok_or_else(|| {
            AppError::PricingUnavailable(anyhow::anyhow!(
                "No pricing data for product {}",
                product_id
            ))
        })?;

        let unit_price = pricing
            .unit_price
            .or(pricing.effective_price)
            .or(pricing.base_price)
            .unwrap_or(Decimal::ZERO);
        let free_tier_limit = pricing.free_tier_limit.unwrap_or(Decimal::ZERO);
        let currency = pricing.currency.unwrap_or_default();

        debug!(
            unit_price = %unit_price,
            free_tier_limit = %free_tier_limit,
            currency = currency.as_str(),
            "Pricing resolved"
        );

        Ok(ResolvedPricing {
            unit_price,
            free_tier_limit,
            currency,
        })
    }
}
