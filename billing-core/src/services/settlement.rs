//! Settlement method selection and record lifecycle.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clients::{BillingRepository, SettlementExecutor};
use crate::models::{BillingMethod, BillingRecord, BillingStatus};

use super::metrics::{record_settled_amount, record_settlement};
use super::{with_timeout, CostBreakdown, CostClassification};

/// Pick exactly one settlement strategy. Fixed priority: zero-cost usage
/// settles as subscription-included, then wallet, then stored credit, then
/// the deferred payment charge. There is no automatic fallback to a
/// lower-priority strategy after a higher-priority one fails mid-flight.
pub fn select_method(
    breakdown: &CostBreakdown,
    wallet_balance: Decimal,
    credit_balance: Decimal,
) -> BillingMethod {
    match breakdown.classification {
        CostClassification::Free | CostClassification::Included => {
            BillingMethod::SubscriptionIncluded
        }
        CostClassification::Billable => {
            if wallet_balance >= breakdown.total_cost {
                BillingMethod::WalletDeduction
            } else if credit_balance >= breakdown.total_cost {
                BillingMethod::CreditConsumption
            } else {
                BillingMethod::PaymentCharge
            }
        }
    }
}

/// Terminal outcome of driving a record through settlement.
#[derive(Debug, Clone)]
pub enum SettlementResult {
    Completed(BillingRecord),
    /// Payment-charge records stay `pending` awaiting the payment
    /// collaborator's confirmation.
    Deferred(BillingRecord),
    Failed(BillingRecord),
}

impl SettlementResult {
    pub fn record(&self) -> &BillingRecord {
        match self {
            SettlementResult::Completed(r)
            | SettlementResult::Deferred(r)
            | SettlementResult::Failed(r) => r,
        }
    }
}

/// Owns the lifecycle of a single billing record from `pending` through its
/// settlement outcome, driving the chosen strategy and reconciling the
/// result.
pub struct SettlementEngine {
    repository: Arc<dyn BillingRepository>,
    executor: Arc<dyn SettlementExecutor>,
    call_timeout: Duration,
}

impl SettlementEngine {
    pub fn new(
        repository: Arc<dyn BillingRepository>,
        executor: Arc<dyn SettlementExecutor>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            executor,
            call_timeout,
        }
    }

    /// Settle a freshly created `pending` record according to its method.
    ///
    /// Transport-level executor errors propagate and leave the record in
    /// `processing`; the reconciliation sweep recovers those. A business
    /// failure reported by the executor transitions the record to `failed`
    /// with its reason; retry happens via a new usage event, never by
    /// mutating the failed record.
    #[instrument(
        skip(self, record),
        fields(billing_id = %record.billing_id, method = record.billing_method.as_str())
    )]
    pub async fn settle(&self, record: BillingRecord) -> Result<SettlementResult, AppError> {
        let method = record.billing_method;
        match method {
            BillingMethod::SubscriptionIncluded => {
                let record = self
                    .transition(record.billing_id, BillingStatus::Processing, None, None, None)
                    .await?;
                let record = self
                    .transition(record.billing_id, BillingStatus::Completed, None, None, None)
                    .await?;
                record_settlement(method.as_str(), "completed");
                Ok(SettlementResult::Completed(record))
            }
            BillingMethod::WalletDeduction => {
                let record = self
                    .transition(record.billing_id, BillingStatus::Processing, None, None, None)
                    .await?;
                let outcome = with_timeout(
                    "deduct_wallet",
                    self.call_timeout,
                    self.executor.deduct_wallet(
                        record.user_id,
                        record.total_amount,
                        &record.usage_record_id,
                    ),
                )
                .await?;

                if outcome.success {
                    let record = self
                        .transition(
                            record.billing_id,
                            BillingStatus::Completed,
                            outcome.transaction_id,
                            None,
                            None,
                        )
                        .await?;
                    self.record_success(&record);
                    Ok(SettlementResult::Completed(record))
                } else {
                    let reason = outcome
                        .error
                        .unwrap_or_else(|| "wallet deduction failed".to_string());
                    let record = self
                        .transition(
                            record.billing_id,
                            BillingStatus::Failed,
                            None,
                            None,
                            Some(reason),
                        )
                        .await?;
                    record_settlement(method.as_str(), "failed");
                    Ok(SettlementResult::Failed(record))
                }
            }
            BillingMethod::CreditConsumption => {
                let record = self
                    .transition(record.billing_id, BillingStatus::Processing, None, None, None)
                    .await?;
                let outcome = with_timeout(
                    "consume_credit",
                    self.call_timeout,
                    self.executor.consume_credit(
                        record.user_id,
                        record.total_amount,
                        &record.usage_record_id,
                    ),
                )
                .await?;

                if outcome.success {
                    let record = self
                        .transition(
                            record.billing_id,
                            BillingStatus::Completed,
                            None,
                            outcome.transaction_id,
                            None,
                        )
                        .await?;
                    self.record_success(&record);
                    Ok(SettlementResult::Completed(record))
                } else {
                    let reason = outcome
                        .error
                        .unwrap_or_else(|| "credit consumption failed".to_string());
                    let record = self
                        .transition(
                            record.billing_id,
                            BillingStatus::Failed,
                            None,
                            None,
                            Some(reason),
                        )
                        .await?;
                    record_settlement(method.as_str(), "failed");
                    Ok(SettlementResult::Failed(record))
                }
            }
            BillingMethod::PaymentCharge => {
                // Deferred: the payment collaborator completes the record.
                info!(
                    total_amount = %record.total_amount,
                    "Payment charge deferred, record left pending"
                );
                record_settlement(method.as_str(), "deferred");
                Ok(SettlementResult::Deferred(record))
            }
        }
    }

    fn record_success(&self, record: &BillingRecord) {
        record_settlement(record.billing_method.as_str(), "completed");
        record_settled_amount(
            record.currency.as_str(),
            record.billing_method.as_str(),
            record.total_amount.to_f64().unwrap_or(0.0),
        );
    }

    async fn transition(
        &self,
        billing_id: Uuid,
        status: BillingStatus,
        wallet_transaction_id: Option<String>,
        payment_transaction_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<BillingRecord, AppError> {
        with_timeout(
            "update_billing_record_status",
            self.call_timeout,
            self.repository.update_billing_record_status(
                billing_id,
                status,
                wallet_transaction_id,
                payment_transaction_id,
                failure_reason,
            ),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Billing record {} not found", billing_id)))
    }
}
