//! Cost calculation: usage amount + resolved pricing -> total cost and
//! classification.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ResolvedPricing;

/// How a usage amount is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostClassification {
    Free,
    Included,
    Billable,
}

impl CostClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostClassification::Free => "free",
            CostClassification::Included => "included",
            CostClassification::Billable => "billable",
        }
    }
}

/// Priced usage, before settlement.
#[derive(Debug, Clone)]
pub struct CostBreakdown {
    pub classification: CostClassification,
    pub raw_cost: Decimal,
    pub total_cost: Decimal,
    /// Set only when the free tier covered the usage.
    pub free_tier_remaining: Option<Decimal>,
}

/// The free-tier rule is all-or-nothing: usage is free only when the whole
/// requested amount fits under the allowance. A single usage record is
/// never split across a free and a billable portion.
pub fn calculate_cost(
    usage_amount: Decimal,
    pricing: &ResolvedPricing,
    included_in_subscription: bool,
) -> CostBreakdown {
    let raw_cost = usage_amount * pricing.unit_price;

    if pricing.free_tier_limit > Decimal::ZERO && usage_amount <= pricing.free_tier_limit {
        return CostBreakdown {
            classification: CostClassification::Free,
            raw_cost,
            total_cost: Decimal::ZERO,
            free_tier_remaining: Some(pricing.free_tier_limit - usage_amount),
        };
    }

    if included_in_subscription {
        return CostBreakdown {
            classification: CostClassification::Included,
            raw_cost,
            total_cost: Decimal::ZERO,
            free_tier_remaining: None,
        };
    }

    CostBreakdown {
        classification: CostClassification::Billable,
        raw_cost,
        total_cost: raw_cost,
        free_tier_remaining: None,
    }
}
