//! Wallet and stored-credit balance lookup contract.

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get_wallet_balance(&self, user_id: Uuid) -> Result<Decimal, AppError>;

    async fn get_credit_balance(&self, user_id: Uuid) -> Result<Decimal, AppError>;
}
