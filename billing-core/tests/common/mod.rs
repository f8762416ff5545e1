//! Test helper module for billing-core integration tests.
//!
//! Provides in-memory collaborator implementations and a wired pipeline.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use billing_core::clients::{
    BalanceProvider, BillingRepository, EventPublisher, PricingProvider, ProductPricing,
    SettlementExecutor, SettlementOutcome, SubscriptionInfo, SubscriptionProvider,
};
use billing_core::config::BillingConfig;
use billing_core::models::{
    BillingEvent, BillingEventKind, BillingMethod, BillingQuota, BillingRecord, BillingStatus,
    Currency, ServiceType, UsageEvent,
};
use billing_core::services::{ReconciliationSweep, UsageAggregator, UsageEventProcessor};
use billing_core::startup::{BillingPipeline, Collaborators};
use service_core::error::AppError;
use service_core::observability::init_test_tracing;

pub const TEST_USER_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const TEST_PRODUCT_ID: &str = "22222222-2222-2222-2222-222222222222";
pub const TEST_SUBSCRIPTION_ID: &str = "33333333-3333-3333-3333-333333333333";

pub fn test_user() -> Uuid {
    Uuid::parse_str(TEST_USER_ID).unwrap()
}

pub fn test_product() -> Uuid {
    Uuid::parse_str(TEST_PRODUCT_ID).unwrap()
}

pub fn test_subscription() -> Uuid {
    Uuid::parse_str(TEST_SUBSCRIPTION_ID).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// In-memory repository enforcing the `usage_record_id` uniqueness
/// constraint and one-directional status transitions.
#[derive(Default)]
pub struct InMemoryRepository {
    records: DashMap<Uuid, BillingRecord>,
    by_usage_id: DashMap<String, Uuid>,
    quotas: DashMap<Uuid, BillingQuota>,
    events: Mutex<Vec<BillingEvent>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing the uniqueness check. For test
    /// setup only (e.g. seeding stuck records).
    pub fn put_record(&self, record: BillingRecord) {
        self.by_usage_id
            .insert(record.usage_record_id.clone(), record.billing_id);
        self.records.insert(record.billing_id, record);
    }

    pub fn put_quota(&self, quota: BillingQuota) {
        self.quotas.insert(quota.quota_id, quota);
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn record_by_usage_id(&self, usage_record_id: &str) -> Option<BillingRecord> {
        let billing_id = *self.by_usage_id.get(usage_record_id)?;
        self.records.get(&billing_id).map(|r| r.value().clone())
    }

    pub fn quota(&self, quota_id: Uuid) -> Option<BillingQuota> {
        self.quotas.get(&quota_id).map(|q| q.value().clone())
    }

    pub fn audit_events(&self) -> Vec<BillingEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn audit_kinds(&self) -> Vec<BillingEventKind> {
        self.audit_events().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl BillingRepository for InMemoryRepository {
    async fn create_billing_record(&self, record: &BillingRecord) -> Result<(), AppError> {
        use dashmap::mapref::entry::Entry;
        match self.by_usage_id.entry(record.usage_record_id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(anyhow::anyhow!(
                "Duplicate usage_record_id: {}",
                record.usage_record_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.billing_id);
                self.records.insert(record.billing_id, record.clone());
                Ok(())
            }
        }
    }

    async fn update_billing_record_status(
        &self,
        billing_id: Uuid,
        status: BillingStatus,
        wallet_transaction_id: Option<String>,
        payment_transaction_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<Option<BillingRecord>, AppError> {
        let Some(mut record) = self.records.get_mut(&billing_id) else {
            return Ok(None);
        };
        if !record.billing_status.can_transition_to(status) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invalid status transition {} -> {}",
                record.billing_status.as_str(),
                status.as_str()
            )));
        }
        record.billing_status = status;
        record.updated_utc = Utc::now();
        if wallet_transaction_id.is_some() {
            record.wallet_transaction_id = wallet_transaction_id;
        }
        if payment_transaction_id.is_some() {
            record.payment_transaction_id = payment_transaction_id;
        }
        if failure_reason.is_some() {
            record.failure_reason = failure_reason;
        }
        Ok(Some(record.clone()))
    }

    async fn get_billing_record(
        &self,
        billing_id: Uuid,
    ) -> Result<Option<BillingRecord>, AppError> {
        Ok(self.records.get(&billing_id).map(|r| r.value().clone()))
    }

    async fn get_billing_record_by_usage_id(
        &self,
        usage_record_id: &str,
    ) -> Result<Option<BillingRecord>, AppError> {
        Ok(self.record_by_usage_id(usage_record_id))
    }

    async fn create_billing_event(&self, event: &BillingEvent) -> Result<(), AppError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn get_billing_quota(
        &self,
        user_id: Uuid,
        service_type: ServiceType,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingQuota>, AppError> {
        let quota = self
            .quotas
            .iter()
            .filter(|q| q.user_id == user_id && q.service_type == service_type && q.is_active(now))
            .max_by_key(|q| q.period_start)
            .map(|q| q.value().clone());
        Ok(quota)
    }

    async fn increment_quota_used(&self, quota_id: Uuid, amount: Decimal) -> Result<(), AppError> {
        let Some(mut quota) = self.quotas.get_mut(&quota_id) else {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Quota {} not found",
                quota_id
            )));
        };
        quota.quota_used += amount;
        quota.updated_utc = Utc::now();
        Ok(())
    }

    async fn list_billing_records(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<BillingRecord>, AppError> {
        let mut records: Vec<BillingRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.user_id == user_id
                    && r.created_utc >= period_start
                    && r.created_utc < period_end
            })
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_utc);
        Ok(records)
    }

    async fn list_stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BillingRecord>, AppError> {
        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.billing_status == BillingStatus::Processing && r.updated_utc <= cutoff
            })
            .map(|r| r.value().clone())
            .collect())
    }
}

/// Pricing provider backed by a map; products without an entry resolve to
/// no pricing data at all.
#[derive(Default)]
pub struct StaticPricing {
    pricing: DashMap<Uuid, ProductPricing>,
}

impl StaticPricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, product_id: Uuid, pricing: ProductPricing) {
        self.pricing.insert(product_id, pricing);
    }
}

#[async_trait]
impl PricingProvider for StaticPricing {
    async fn get_product_pricing(
        &self,
        product_id: Uuid,
        _user_id: Uuid,
        _subscription_id: Option<Uuid>,
    ) -> Result<Option<ProductPricing>, AppError> {
        Ok(self.pricing.get(&product_id).map(|p| p.value().clone()))
    }
}

#[derive(Default)]
pub struct StaticSubscriptions {
    subscriptions: DashMap<Uuid, SubscriptionInfo>,
}

impl StaticSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, info: SubscriptionInfo) {
        self.subscriptions.insert(info.subscription_id, info);
    }
}

#[async_trait]
impl SubscriptionProvider for StaticSubscriptions {
    async fn get_subscription_info(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<SubscriptionInfo>, AppError> {
        Ok(self.subscriptions.get(&subscription_id).map(|s| s.value().clone()))
    }
}

/// Balance provider with settable balances (zero by default). Setting
/// `hang` makes every call suspend forever, for timeout tests.
#[derive(Default)]
pub struct StaticBalances {
    wallet: DashMap<Uuid, Decimal>,
    credit: DashMap<Uuid, Decimal>,
    pub hang: AtomicBool,
}

impl StaticBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_wallet(&self, user_id: Uuid, amount: Decimal) {
        self.wallet.insert(user_id, amount);
    }

    pub fn set_credit(&self, user_id: Uuid, amount: Decimal) {
        self.credit.insert(user_id, amount);
    }

    async fn hang_if_requested(&self) {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl BalanceProvider for StaticBalances {
    async fn get_wallet_balance(&self, user_id: Uuid) -> Result<Decimal, AppError> {
        self.hang_if_requested().await;
        Ok(self
            .wallet
            .get(&user_id)
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO))
    }

    async fn get_credit_balance(&self, user_id: Uuid) -> Result<Decimal, AppError> {
        self.hang_if_requested().await;
        Ok(self
            .credit
            .get(&user_id)
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO))
    }
}

#[derive(Debug, Clone)]
pub struct SettlementCall {
    pub kind: &'static str,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub reference: String,
}

/// Settlement executor that records every call. Succeeds with generated
/// transaction ids unless the matching `fail_*` flag is set, in which case
/// it reports a business failure (not a transport error).
#[derive(Default)]
pub struct RecordingSettlement {
    pub fail_wallet: AtomicBool,
    pub fail_credit: AtomicBool,
    counter: AtomicU64,
    calls: Mutex<Vec<SettlementCall>>,
}

impl RecordingSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SettlementCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, kind: &'static str, user_id: Uuid, amount: Decimal, reference: &str) {
        self.calls.lock().unwrap().push(SettlementCall {
            kind,
            user_id,
            amount,
            reference: reference.to_string(),
        });
    }
}

#[async_trait]
impl SettlementExecutor for RecordingSettlement {
    async fn deduct_wallet(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<SettlementOutcome, AppError> {
        self.record_call("wallet", user_id, amount, reference);
        if self.fail_wallet.load(Ordering::SeqCst) {
            return Ok(SettlementOutcome {
                success: false,
                transaction_id: None,
                error: Some("insufficient wallet balance".to_string()),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(SettlementOutcome {
            success: true,
            transaction_id: Some(format!("wtx-{}", n)),
            error: None,
        })
    }

    async fn consume_credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<SettlementOutcome, AppError> {
        self.record_call("credit", user_id, amount, reference);
        if self.fail_credit.load(Ordering::SeqCst) {
            return Ok(SettlementOutcome {
                success: false,
                transaction_id: None,
                error: Some("insufficient credit balance".to_string()),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(SettlementOutcome {
            success: true,
            transaction_id: Some(format!("ctx-{}", n)),
            error: None,
        })
    }
}

/// Publisher that captures published events; can be told to fail.
#[derive(Default)]
pub struct CapturingPublisher {
    pub fail: AtomicBool,
    published: Mutex<Vec<BillingEvent>>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<BillingEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_kinds(&self) -> Vec<BillingEventKind> {
        self.published().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, event: &BillingEvent) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::BadGateway("bus unavailable".to_string()));
        }
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Fully wired pipeline over in-memory collaborators.
pub struct TestHarness {
    pub repository: Arc<InMemoryRepository>,
    pub pricing: Arc<StaticPricing>,
    pub subscriptions: Arc<StaticSubscriptions>,
    pub balances: Arc<StaticBalances>,
    pub settlement: Arc<RecordingSettlement>,
    pub publisher: Arc<CapturingPublisher>,
    pipeline: BillingPipeline,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(BillingConfig::default())
    }

    pub fn with_config(config: BillingConfig) -> Self {
        init_test_tracing("warn");

        let repository = Arc::new(InMemoryRepository::new());
        let pricing = Arc::new(StaticPricing::new());
        let subscriptions = Arc::new(StaticSubscriptions::new());
        let balances = Arc::new(StaticBalances::new());
        let settlement = Arc::new(RecordingSettlement::new());
        let publisher = Arc::new(CapturingPublisher::new());

        let pipeline = BillingPipeline::build(
            &config,
            Collaborators {
                repository: repository.clone(),
                pricing: pricing.clone(),
                subscriptions: subscriptions.clone(),
                balances: balances.clone(),
                settlement: settlement.clone(),
                publisher: publisher.clone(),
            },
        );

        Self {
            repository,
            pricing,
            subscriptions,
            balances,
            settlement,
            publisher,
            pipeline,
        }
    }

    pub fn processor(&self) -> Arc<UsageEventProcessor> {
        self.pipeline.processor()
    }

    pub fn aggregator(&self) -> Arc<UsageAggregator> {
        self.pipeline.aggregator()
    }

    pub fn sweep(&self) -> Arc<ReconciliationSweep> {
        self.pipeline.sweep()
    }

    /// Standard billable pricing: $0.03 per unit, no free tier.
    pub fn with_standard_pricing(self) -> Self {
        self.pricing.set(
            test_product(),
            ProductPricing {
                unit_price: Some(dec("0.03")),
                currency: Some(Currency::Usd),
                ..Default::default()
            },
        );
        self
    }
}

pub fn make_event(event_id: &str, amount: Decimal) -> UsageEvent {
    UsageEvent {
        event_id: event_id.to_string(),
        user_id: test_user(),
        organization_id: None,
        subscription_id: None,
        product_id: test_product(),
        service_type: ServiceType::ApiCall,
        usage_amount: amount,
        unit_type: "units".to_string(),
        usage_details: None,
        timestamp: Utc::now(),
    }
}

pub fn make_quota(limit: Decimal, used: Decimal) -> BillingQuota {
    let now = Utc::now();
    BillingQuota {
        quota_id: Uuid::new_v4(),
        user_id: test_user(),
        organization_id: None,
        subscription_id: None,
        service_type: ServiceType::ApiCall,
        quota_limit: limit,
        quota_used: used,
        period_start: now - Duration::hours(1),
        period_end: now + Duration::hours(1),
        created_utc: now,
        updated_utc: now,
    }
}

/// A record parked in `processing`, as a crash mid-settlement leaves it.
pub fn make_processing_record(usage_record_id: &str, updated_utc: DateTime<Utc>) -> BillingRecord {
    BillingRecord {
        billing_id: Uuid::new_v4(),
        user_id: test_user(),
        organization_id: None,
        subscription_id: None,
        usage_record_id: usage_record_id.to_string(),
        product_id: test_product(),
        service_type: ServiceType::ApiCall,
        usage_amount: dec("1000"),
        unit_price: dec("0.03"),
        total_amount: dec("30.00"),
        currency: Currency::Usd,
        billing_method: BillingMethod::WalletDeduction,
        billing_status: BillingStatus::Processing,
        wallet_transaction_id: None,
        payment_transaction_id: None,
        failure_reason: None,
        metadata: None,
        created_utc: updated_utc,
        updated_utc,
    }
}
