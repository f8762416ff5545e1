//! Collaborator contracts consumed by the core.
//!
//! Every external dependency of the pipeline (durable storage, pricing,
//! subscription terms, balances, settlement execution and the outbound
//! bus) is an async trait injected at construction. Implementations live
//! with the transports that back them, not here.

mod balance;
mod pricing;
mod publisher;
mod repository;
mod settlement;
mod subscription;

pub use balance::BalanceProvider;
pub use pricing::{PricingProvider, ProductPricing};
pub use publisher::EventPublisher;
pub use repository::BillingRepository;
pub use settlement::{SettlementExecutor, SettlementOutcome};
pub use subscription::{IncludedProduct, SubscriptionInfo, SubscriptionProvider};
