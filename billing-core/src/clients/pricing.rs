//! Product pricing lookup contract.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::Currency;

/// Raw pricing response for a product in a user/subscription context.
/// Fields are layered overrides; the resolver picks the first one present:
/// `unit_price`, then `effective_price`, then `base_price`, else zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPricing {
    pub unit_price: Option<Decimal>,
    pub effective_price: Option<Decimal>,
    pub base_price: Option<Decimal>,
    pub free_tier_limit: Option<Decimal>,
    pub currency: Option<Currency>,
}

#[async_trait]
pub trait PricingProvider: Send + Sync {
    /// `None` means the product has no pricing data at all, a hard stop
    /// for the caller, since no cost can be computed without a price.
    async fn get_product_pricing(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> Result<Option<ProductPricing>, AppError>;
}
