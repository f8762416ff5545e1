//! Pipeline composition and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::clients::{
    BalanceProvider, BillingRepository, EventPublisher, PricingProvider, SettlementExecutor,
    SubscriptionProvider,
};
use crate::config::BillingConfig;
use crate::services::{init_metrics, ReconciliationSweep, UsageAggregator, UsageEventProcessor};

/// The collaborator set the core is wired against. Implementations belong
/// to the embedding service (database adapters, service clients, the bus).
pub struct Collaborators {
    pub repository: Arc<dyn BillingRepository>,
    pub pricing: Arc<dyn PricingProvider>,
    pub subscriptions: Arc<dyn SubscriptionProvider>,
    pub balances: Arc<dyn BalanceProvider>,
    pub settlement: Arc<dyn SettlementExecutor>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// Fully wired billing pipeline.
pub struct BillingPipeline {
    processor: Arc<UsageEventProcessor>,
    sweep: Arc<ReconciliationSweep>,
    aggregator: Arc<UsageAggregator>,
    sweep_interval: Duration,
}

impl BillingPipeline {
    /// Build the pipeline from configuration and collaborators.
    pub fn build(config: &BillingConfig, collaborators: Collaborators) -> Self {
        init_metrics();

        let call_timeout = config.processor.call_timeout();

        let processor = Arc::new(UsageEventProcessor::new(
            &config.processor,
            collaborators.repository.clone(),
            collaborators.pricing,
            collaborators.subscriptions,
            collaborators.balances,
            collaborators.settlement,
            collaborators.publisher.clone(),
        ));

        let sweep = Arc::new(ReconciliationSweep::new(
            &config.reconciliation,
            call_timeout,
            collaborators.repository.clone(),
            collaborators.publisher,
        ));

        let aggregator = Arc::new(UsageAggregator::new(
            collaborators.repository,
            call_timeout,
        ));

        Self {
            processor,
            sweep,
            aggregator,
            sweep_interval: config.reconciliation.sweep_interval(),
        }
    }

    pub fn processor(&self) -> Arc<UsageEventProcessor> {
        self.processor.clone()
    }

    pub fn aggregator(&self) -> Arc<UsageAggregator> {
        self.aggregator.clone()
    }

    pub fn sweep(&self) -> Arc<ReconciliationSweep> {
        self.sweep.clone()
    }

    /// Spawn the periodic reconciliation sweep on the current runtime.
    pub fn spawn_reconciliation(&self) -> JoinHandle<()> {
        let sweep = self.sweep.clone();
        let interval = self.sweep_interval;
        tokio::spawn(async move { sweep.run(interval).await })
    }
}
