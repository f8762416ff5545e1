//! Subscription terms lookup contract.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

/// A product bundled into a subscription with a covered usage allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludedProduct {
    pub product_id: Uuid,
    pub included_amount: Decimal,
}

/// Subscription terms as returned by the subscription service. The
/// inclusion list is not required to be sorted; `product_id` is unique
/// within it, and if duplicates ever appear the first entry encountered is
/// authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub subscription_id: Uuid,
    pub included_products: Vec<IncludedProduct>,
}

#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    async fn get_subscription_info(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<SubscriptionInfo>, AppError>;
}
