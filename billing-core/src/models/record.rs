//! Billing record model and its status/method enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of billable service a usage event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    ModelInference,
    ApiCall,
    Storage,
    Other,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ModelInference => "model_inference",
            ServiceType::ApiCall => "api_call",
            ServiceType::Storage => "storage",
            ServiceType::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "model_inference" => ServiceType::ModelInference,
            "api_call" => ServiceType::ApiCall,
            "storage" => ServiceType::Storage,
            _ => ServiceType::Other,
        }
    }
}

/// Settlement currency. `Credits` is the platform-internal denomination and
/// the default when a pricing response carries no currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    #[default]
    Credits,
    Usd,
    Inr,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Credits => "credits",
            Currency::Usd => "USD",
            Currency::Inr => "INR",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "USD" | "usd" => Currency::Usd,
            "INR" | "inr" => Currency::Inr,
            _ => Currency::Credits,
        }
    }
}

/// How a record's cost is (or will be) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMethod {
    SubscriptionIncluded,
    WalletDeduction,
    CreditConsumption,
    PaymentCharge,
}

impl BillingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMethod::SubscriptionIncluded => "subscription_included",
            BillingMethod::WalletDeduction => "wallet_deduction",
            BillingMethod::CreditConsumption => "credit_consumption",
            BillingMethod::PaymentCharge => "payment_charge",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "wallet_deduction" => BillingMethod::WalletDeduction,
            "credit_consumption" => BillingMethod::CreditConsumption,
            "payment_charge" => BillingMethod::PaymentCharge,
            _ => BillingMethod::SubscriptionIncluded,
        }
    }
}

/// Billing record lifecycle status.
///
/// Transitions are one-directional: `pending -> processing -> completed`
/// or `pending -> processing -> failed`. A record settled by the deferred
/// payment-charge method never leaves `pending` inside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "pending",
            BillingStatus::Processing => "processing",
            BillingStatus::Completed => "completed",
            BillingStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "processing" => BillingStatus::Processing,
            "completed" => BillingStatus::Completed,
            "failed" => BillingStatus::Failed,
            _ => BillingStatus::Pending,
        }
    }

    /// True when no further transition may leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BillingStatus::Completed | BillingStatus::Failed)
    }

    /// One-directional transition check; no status is ever re-entered.
    pub fn can_transition_to(&self, next: BillingStatus) -> bool {
        matches!(
            (self, next),
            (BillingStatus::Pending, BillingStatus::Processing)
                | (BillingStatus::Processing, BillingStatus::Completed)
                | (BillingStatus::Processing, BillingStatus::Failed)
        )
    }
}

/// One priced, settled-or-settling unit of usage.
///
/// Created once per admitted usage event and mutated only by status
/// transitions; never deleted. `usage_record_id` ties the record back to the
/// originating usage event and is unique across all records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRecord {
    pub billing_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub usage_record_id: String,
    pub product_id: Uuid,
    pub service_type: ServiceType,
    pub usage_amount: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub billing_method: BillingMethod,
    pub billing_status: BillingStatus,
    pub wallet_transaction_id: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
