//! Settlement execution contract (wallet deduction, credit consumption).

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

/// Result of a settlement attempt. `success == false` is a business
/// failure (insufficient funds, provider rejection) and carries `error`;
/// transport problems surface as `Err(AppError)` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait SettlementExecutor: Send + Sync {
    async fn deduct_wallet(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<SettlementOutcome, AppError>;

    async fn consume_credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<SettlementOutcome, AppError>;
}
